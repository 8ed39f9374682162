// Scraping Provider Port
// Abstraction over the external asynchronous SERP scraping API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extra provider-specific parameter (e.g. `{"key": "filter", "value": 1}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextParam {
    pub key: String,
    pub value: serde_json::Value,
}

/// Search task submitted to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub source: String,
    pub query: String,
    pub geo_location: String,
    pub device: String,
    pub parse: bool,
    pub pages: u32,
    pub locale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextParam>,
}

/// Provider-side job status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderJobStatus {
    Pending,
    Done,
    /// The provider reports the job itself failed
    Failed(String),
}

/// Provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Connection failed: {0}")]
    Connectivity(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// 5xx or 429
    #[error("Provider unavailable ({status}): {body}")]
    Server { status: u16, body: String },

    /// Parseable response with an unexpected shape
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// 4xx other than 429
    #[error("Provider rejected request ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("Provider job failed: {0}")]
    JobFailed(String),
}

impl ProviderError {
    /// Retryable errors consume one attempt; the rest fail the job immediately
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Connectivity(_)
            | ProviderError::Timeout(_)
            | ProviderError::Server { .. }
            | ProviderError::Malformed(_) => true,
            ProviderError::Client { .. } | ProviderError::JobFailed(_) => false,
        }
    }
}

/// Scraping provider
///
/// Implementations:
/// - HttpSerpProvider: REST client (infra-http)
/// - ScriptedProvider: canned responses for tests
#[async_trait]
pub trait SerpProvider: Send + Sync {
    /// Submit a search task and return the provider's job id
    async fn submit(&self, request: &SearchRequest) -> Result<String, ProviderError>;

    /// Current status of a provider job
    async fn status(&self, job_id: &str) -> Result<ProviderJobStatus, ProviderError>;

    /// Raw nested results payload of a finished job
    async fn results(&self, job_id: &str) -> Result<serde_json::Value, ProviderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type StatusScript = VecDeque<Result<ProviderJobStatus, ProviderError>>;

    /// Provider returning scripted status sequences per job.
    ///
    /// The last scripted response repeats once the script runs out; jobs without
    /// a script report `Pending`.
    #[derive(Default)]
    pub struct ScriptedProvider {
        scripts: Mutex<HashMap<String, StatusScript>>,
        results: Mutex<HashMap<String, serde_json::Value>>,
        submitted: Mutex<Vec<SearchRequest>>,
        status_calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script_status(
            &self,
            job_id: &str,
            responses: Vec<Result<ProviderJobStatus, ProviderError>>,
        ) {
            self.scripts
                .lock()
                .unwrap()
                .insert(job_id.to_string(), responses.into_iter().collect());
        }

        pub fn set_results(&self, job_id: &str, payload: serde_json::Value) {
            self.results
                .lock()
                .unwrap()
                .insert(job_id.to_string(), payload);
        }

        pub fn submitted(&self) -> Vec<SearchRequest> {
            self.submitted.lock().unwrap().clone()
        }

        pub fn status_calls(&self, job_id: &str) -> usize {
            self.status_calls
                .lock()
                .unwrap()
                .get(job_id)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl SerpProvider for ScriptedProvider {
        async fn submit(&self, request: &SearchRequest) -> Result<String, ProviderError> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(request.clone());
            Ok(format!("provider-job-{}", submitted.len()))
        }

        async fn status(&self, job_id: &str) -> Result<ProviderJobStatus, ProviderError> {
            *self
                .status_calls
                .lock()
                .unwrap()
                .entry(job_id.to_string())
                .or_insert(0) += 1;

            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(job_id) {
                Some(script) if script.len() > 1 => {
                    script.pop_front().unwrap_or(Ok(ProviderJobStatus::Pending))
                }
                Some(script) => script
                    .front()
                    .cloned()
                    .unwrap_or(Ok(ProviderJobStatus::Pending)),
                None => Ok(ProviderJobStatus::Pending),
            }
        }

        async fn results(&self, job_id: &str) -> Result<serde_json::Value, ProviderError> {
            self.results
                .lock()
                .unwrap()
                .get(job_id)
                .cloned()
                .ok_or_else(|| ProviderError::Client {
                    status: 404,
                    body: format!("no results for {}", job_id),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Timeout("20s".into()).is_retryable());
        assert!(ProviderError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(ProviderError::Malformed("no status".into()).is_retryable());
        assert!(!ProviderError::Client {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::JobFailed("faulted".into()).is_retryable());
    }

    #[test]
    fn test_search_request_body_shape() {
        let request = SearchRequest {
            source: "google_search".into(),
            query: "plumbers near me".into(),
            geo_location: "Boston, MA".into(),
            device: "desktop".into(),
            parse: true,
            pages: 1,
            locale: "en-us".into(),
            context: vec![],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["geo_location"], "Boston, MA");
        assert_eq!(body["parse"], true);
        assert!(body.get("context").is_none());
    }
}
