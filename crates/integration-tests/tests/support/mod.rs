//! Shared wiring for end-to-end tests: real file-backed queues, an in-memory
//! SQLite staging table, and a scripted provider.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use serpwatch_core::application::{
    JobLifecycleManager, PollingProcessor, ProcessorConfig, RetryPolicy, SerpWorkflow,
    StagingDeduplicator, WorkflowDeps,
};
use serpwatch_core::domain::{JobRecord, JobStatus};
use serpwatch_core::port::serp_provider::mocks::ScriptedProvider;
use serpwatch_core::port::time_provider::mocks::MockTimeProvider;
use serpwatch_core::port::{JobStore, TimeProvider};
use serpwatch_infra_fs::{FsJobStore, FsResultArchive, HtmlReportRenderer, LocalArtifactStore};
use serpwatch_infra_sqlite::{create_pool, run_migrations, SqliteStagingRepository};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<FsJobStore>,
    pub staging: Arc<SqliteStagingRepository>,
    pub deduplicator: Arc<StagingDeduplicator>,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<MockTimeProvider>,
    pub lifecycle: Arc<JobLifecycleManager>,
    pub processor: PollingProcessor,
}

/// Short real delays: SQLite and file I/O run on blocking threads, so the
/// tokio clock is not paused here
pub fn fast_config() -> ProcessorConfig {
    ProcessorConfig {
        poll_max_attempts: 2,
        poll_delay: Duration::from_millis(5),
        poll_timeout: Duration::from_secs(2),
        idle_interval: Duration::from_millis(10),
        extended_idle_interval: Duration::from_millis(20),
        busy_interval: Duration::from_millis(1),
        error_cooldown: Duration::from_millis(5),
        ..ProcessorConfig::default()
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(fast_config()).await
    }

    pub async fn with_config(config: ProcessorConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsJobStore::open(dir.path().join("queues")).await.unwrap());

        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let staging = Arc::new(SqliteStagingRepository::new(pool));
        let deduplicator = Arc::new(StagingDeduplicator::new(staging.clone()));

        let provider = Arc::new(ScriptedProvider::new());
        let clock = Arc::new(MockTimeProvider::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        let lifecycle = Arc::new(JobLifecycleManager::new(store.clone(), clock.clone()));

        let workflow = SerpWorkflow::standard(
            WorkflowDeps {
                archive: Arc::new(FsResultArchive::new(dir.path().join("results"))),
                deduplicator: deduplicator.clone(),
                renderer: Arc::new(HtmlReportRenderer::new()),
                artifacts: Arc::new(LocalArtifactStore::new(dir.path().join("artifacts"))),
                downstream_policy: RetryPolicy::new(
                    1,
                    Duration::from_millis(1),
                    Duration::from_secs(2),
                ),
            },
            clock.clone(),
        );

        let processor = PollingProcessor::new(
            lifecycle.clone(),
            provider.clone(),
            Arc::new(workflow),
            clock.clone(),
            config,
        );

        Self {
            dir,
            store,
            staging,
            deduplicator,
            provider,
            clock,
            lifecycle,
            processor,
        }
    }

    pub async fn enqueue(&self, id: &str, query: &str, location: &str) {
        self.lifecycle
            .enqueue(JobRecord::new(id, query, location, self.clock.now()))
            .await
            .unwrap();
    }

    /// Which queues hold each job id (one entry per copy)
    pub async fn memberships(&self) -> HashMap<String, Vec<JobStatus>> {
        let mut seen: HashMap<String, Vec<JobStatus>> = HashMap::new();
        for status in JobStatus::ALL {
            for job in self.store.load(status).await.unwrap().queries {
                seen.entry(job.id).or_default().push(status);
            }
        }
        seen
    }

    pub async fn assert_single_membership(&self) {
        for (id, queues) in self.memberships().await {
            assert_eq!(queues.len(), 1, "job {} found in {:?}", id, queues);
        }
    }

    pub async fn job(&self, status: JobStatus, id: &str) -> Option<JobRecord> {
        self.store.load(status).await.unwrap().get(id).cloned()
    }
}

/// Provider payload with two paid and one organic listing
pub fn two_paid_payload() -> Value {
    json!({
        "results": [{
            "content": {
                "url": "https://www.google.com/search?q=plumbers+near+me",
                "page": 1,
                "total_results_count": 48100000,
                "results": {
                    "paid": [
                        {
                            "pos": 1,
                            "url": "https://fastplumbing.example/boston",
                            "title": "Fast Plumbing Boston",
                            "desc": "24/7 emergency service",
                            "url_shown": "fastplumbing.example"
                        },
                        {
                            "pos": 2,
                            "url": "https://drainpros.example",
                            "title": "Drain Pros",
                            "desc": "Licensed plumbers",
                            "url_shown": "drainpros.example"
                        }
                    ],
                    "organic": [
                        {
                            "pos": 1,
                            "pos_overall": 3,
                            "url": "https://www.yelp.example/plumbers-boston",
                            "title": "Top 10 Plumbers in Boston"
                        }
                    ]
                }
            },
            "created_at": "2024-05-01 09:00:04"
        }]
    })
}
