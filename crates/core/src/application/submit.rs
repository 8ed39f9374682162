// Job submission: provider submit + local enqueue
use crate::application::lifecycle::JobLifecycleManager;
use crate::domain::JobRecord;
use crate::error::{AppError, Result};
use crate::port::{ContextParam, IdProvider, SearchRequest, SerpProvider, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Request fields that do not vary per job
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDefaults {
    pub source: String,
    pub device: String,
    pub locale: String,
    pub pages: u32,
    pub parse: bool,
    pub context: Vec<ContextParam>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            source: "google_search".to_string(),
            device: "desktop".to_string(),
            locale: "en-us".to_string(),
            pages: 1,
            parse: true,
            context: Vec::new(),
        }
    }
}

impl SearchDefaults {
    pub fn request(&self, query: &str, location: &str) -> SearchRequest {
        SearchRequest {
            source: self.source.clone(),
            query: query.to_string(),
            geo_location: location.to_string(),
            device: self.device.clone(),
            parse: self.parse,
            pages: self.pages,
            locale: self.locale.clone(),
            context: self.context.clone(),
        }
    }
}

pub struct JobSubmitter {
    provider: Arc<dyn SerpProvider>,
    lifecycle: Arc<JobLifecycleManager>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    defaults: SearchDefaults,
}

impl JobSubmitter {
    pub fn new(
        provider: Arc<dyn SerpProvider>,
        lifecycle: Arc<JobLifecycleManager>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        defaults: SearchDefaults,
    ) -> Self {
        Self {
            provider,
            lifecycle,
            time_provider,
            id_provider,
            defaults,
        }
    }

    /// Submit a search to the provider and enqueue the returned job id
    pub async fn submit(&self, query: &str, location: &str) -> Result<JobRecord> {
        let query = query.trim();
        let location = location.trim();
        if query.is_empty() || location.is_empty() {
            return Err(AppError::Validation(
                "query and location must not be empty".to_string(),
            ));
        }

        let job_id = self
            .provider
            .submit(&self.defaults.request(query, location))
            .await?;
        info!(job_id = %job_id, query = %query, location = %location, "Search submitted");

        self.enqueue_existing(Some(job_id), query, location).await
    }

    /// Enqueue a job whose provider id is already known; without an id a
    /// local one is generated
    pub async fn enqueue_existing(
        &self,
        job_id: Option<String>,
        query: &str,
        location: &str,
    ) -> Result<JobRecord> {
        let id = job_id.unwrap_or_else(|| self.id_provider.generate_id());
        let record = JobRecord::new(id, query.trim(), location.trim(), self.time_provider.now());
        self.lifecycle.enqueue(record.clone()).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::serp_provider::mocks::ScriptedProvider;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::id_provider::mocks::SequentialIdProvider;

    fn setup() -> (Arc<InMemoryJobStore>, Arc<ScriptedProvider>, JobSubmitter) {
        let store = Arc::new(InMemoryJobStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let lifecycle = Arc::new(JobLifecycleManager::new(store.clone(), time.clone()));
        let submitter = JobSubmitter::new(
            provider.clone(),
            lifecycle,
            time,
            Arc::new(SequentialIdProvider::new()),
            SearchDefaults::default(),
        );
        (store, provider, submitter)
    }

    #[tokio::test]
    async fn test_submit_enqueues_provider_id() {
        let (store, provider, submitter) = setup();

        let record = submitter
            .submit("plumbers near me", "Boston, MA")
            .await
            .unwrap();

        assert_eq!(record.id, "provider-job-1");
        assert_eq!(record.status, JobStatus::Submitted);
        assert!(store.snapshot(JobStatus::Submitted).contains("provider-job-1"));

        let sent = provider.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].geo_location, "Boston, MA");
        assert_eq!(sent[0].source, "google_search");
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_query_before_calling_provider() {
        let (_store, provider, submitter) = setup();
        assert!(submitter.submit("  ", "Boston, MA").await.is_err());
        assert!(provider.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_without_id_generates_local_id() {
        let (_store, _provider, submitter) = setup();
        let record = submitter
            .enqueue_existing(None, "dentists", "Austin, TX")
            .await
            .unwrap();
        assert_eq!(record.id, "local-1");
        assert_eq!(record.location, "Austin, TX");
    }
}
