// REST client for the asynchronous scraping provider
//
// POST {base}/v1/queries               -> {"id": ...}
// GET  {base}/v1/queries/{id}          -> {"status": "pending" | "done" | "faulted" | "failed"}
// GET  {base}/v1/queries/{id}/results  -> raw results payload

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use serpwatch_core::error::{AppError, Result};
use serpwatch_core::port::{ProviderError, ProviderJobStatus, SearchRequest, SerpProvider};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
}

pub struct HttpSerpProvider {
    client: reqwest::Client,
    base_url: Url,
    config: HttpProviderConfig,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpSerpProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                AppError::Config(format!("invalid provider base url '{}'", config.base_url))
            })?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Base url plus `segments`, each percent-encoded as a single path segment
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Connectivity(format!("base url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> std::result::Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = check_status(response).await?;
        response.json().await.map_err(map_reqwest_error)
    }
}

/// 5xx and 429 are worth retrying; any other non-success status is final
async fn check_status(response: Response) -> std::result::Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(ProviderError::Server {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(ProviderError::Client {
            status: status.as_u16(),
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_decode() {
        ProviderError::Malformed(err.to_string())
    } else {
        ProviderError::Connectivity(err.to_string())
    }
}

fn parse_status(response: StatusResponse) -> std::result::Result<ProviderJobStatus, ProviderError> {
    match response.status.as_deref() {
        Some("pending") => Ok(ProviderJobStatus::Pending),
        Some("done") => Ok(ProviderJobStatus::Done),
        Some("failed") | Some("faulted") => Ok(ProviderJobStatus::Failed(
            response
                .error
                .unwrap_or_else(|| "provider reported failure".to_string()),
        )),
        Some(other) => Err(ProviderError::Malformed(format!(
            "unknown job status '{}'",
            other
        ))),
        None => Err(ProviderError::Malformed(
            "status response has no status field".to_string(),
        )),
    }
}

#[async_trait]
impl SerpProvider for HttpSerpProvider {
    async fn submit(&self, request: &SearchRequest) -> std::result::Result<String, ProviderError> {
        let response = self
            .client
            .post(self.endpoint(&["v1", "queries"])?)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let body: SubmitResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(map_reqwest_error)?;

        let id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Malformed("submit response has no id".to_string()))?;
        debug!(job_id = %id, "Provider accepted query");
        Ok(id)
    }

    async fn status(&self, job_id: &str) -> std::result::Result<ProviderJobStatus, ProviderError> {
        let value = self
            .get_json(self.endpoint(&["v1", "queries", job_id])?)
            .await?;
        let response: StatusResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parse_status(response)
    }

    async fn results(&self, job_id: &str) -> std::result::Result<Value, ProviderError> {
        self.get_json(self.endpoint(&["v1", "queries", job_id, "results"])?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_fake_provider() -> String {
        async fn submit(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if !headers.contains_key("authorization") {
                return (StatusCode::UNAUTHORIZED, Json(json!({"message": "no auth"})));
            }
            if body["geo_location"] != "Boston, MA" {
                return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad geo"})));
            }
            (StatusCode::OK, Json(json!({"id": "remote-1"})))
        }

        async fn status(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
            match id.as_str() {
                "pending-job" => (StatusCode::OK, Json(json!({"status": "pending"}))),
                "done-job" => (StatusCode::OK, Json(json!({"status": "done"}))),
                "faulted-job" => (
                    StatusCode::OK,
                    Json(json!({"status": "faulted", "error": "captcha"})),
                ),
                "weird-job" => (StatusCode::OK, Json(json!({"state": "??"}))),
                "busy-job" => (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))),
                "broken-job" => (StatusCode::BAD_GATEWAY, Json(json!({}))),
                "odd/id?x=1" => (StatusCode::OK, Json(json!({"status": "done"}))),
                _ => (StatusCode::NOT_FOUND, Json(json!({"message": "unknown"}))),
            }
        }

        async fn results(Path(id): Path<String>) -> Json<Value> {
            Json(json!({"results": [{"content": {"url": id}}]}))
        }

        let app = Router::new()
            .route("/v1/queries", post(submit))
            .route("/v1/queries/:id", get(status))
            .route("/v1/queries/:id/results", get(results));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn provider(base_url: String) -> HttpSerpProvider {
        HttpSerpProvider::new(HttpProviderConfig {
            base_url,
            username: "user".to_string(),
            password: "secret".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request() -> SearchRequest {
        SearchRequest {
            source: "google_search".to_string(),
            query: "plumbers near me".to_string(),
            geo_location: "Boston, MA".to_string(),
            device: "desktop".to_string(),
            parse: true,
            pages: 1,
            locale: "en-us".to_string(),
            context: vec![],
        }
    }

    #[tokio::test]
    async fn test_submit_returns_provider_id() {
        let provider = provider(spawn_fake_provider().await);
        assert_eq!(provider.submit(&request()).await.unwrap(), "remote-1");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let provider = provider(spawn_fake_provider().await);

        assert_eq!(
            provider.status("pending-job").await.unwrap(),
            ProviderJobStatus::Pending
        );
        assert_eq!(
            provider.status("done-job").await.unwrap(),
            ProviderJobStatus::Done
        );
        assert_eq!(
            provider.status("faulted-job").await.unwrap(),
            ProviderJobStatus::Failed("captcha".to_string())
        );
        assert!(matches!(
            provider.status("weird-job").await,
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_http_error_classification() {
        let provider = provider(spawn_fake_provider().await);

        let busy = provider.status("busy-job").await.unwrap_err();
        assert!(matches!(busy, ProviderError::Server { status: 429, .. }));
        assert!(busy.is_retryable());

        let broken = provider.status("broken-job").await.unwrap_err();
        assert!(matches!(broken, ProviderError::Server { status: 502, .. }));

        let missing = provider.status("nope").await.unwrap_err();
        assert!(matches!(missing, ProviderError::Client { status: 404, .. }));
        assert!(!missing.is_retryable());
    }

    #[tokio::test]
    async fn test_results_payload_is_passed_through() {
        let provider = provider(spawn_fake_provider().await);
        let payload = provider.results("done-job").await.unwrap();
        assert_eq!(payload["results"][0]["content"]["url"], "done-job");
    }

    #[tokio::test]
    async fn test_job_id_stays_one_path_segment() {
        let provider = provider(format!("{}/", spawn_fake_provider().await));

        assert_eq!(
            provider.status("odd/id?x=1").await.unwrap(),
            ProviderJobStatus::Done
        );
        let payload = provider.results("odd/id?x=1").await.unwrap();
        assert_eq!(payload["results"][0]["content"]["url"], "odd/id?x=1");
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let err = HttpSerpProvider::new(HttpProviderConfig {
            base_url: "mailto:ops@example.com".to_string(),
            username: String::new(),
            password: String::new(),
            request_timeout: Duration::from_secs(1),
        });
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_connectivity_error() {
        let provider = provider("http://127.0.0.1:1".to_string());
        let err = provider.status("any").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
