// Composition root: every adapter is built once here and injected as Arc<dyn Port>

use crate::config::{Settings, StoragePaths};
use anyhow::{Context, Result};
use serpwatch_core::application::{
    JobLifecycleManager, JobSubmitter, PollingProcessor, SerpWorkflow, StagingDeduplicator,
    WorkflowDeps,
};
use serpwatch_core::domain::JobRecord;
use serpwatch_core::port::{SerpProvider, SystemTimeProvider, TimeProvider, UuidProvider};
use serpwatch_infra_fs::{FsJobStore, FsResultArchive, HtmlReportRenderer, LocalArtifactStore};
use serpwatch_infra_http::HttpSerpProvider;
use serpwatch_infra_sqlite::{create_pool, run_migrations, SqliteStagingRepository};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct AppContext {
    settings: Settings,
    paths: StoragePaths,
    time_provider: Arc<dyn TimeProvider>,
    lifecycle: Arc<JobLifecycleManager>,
}

impl AppContext {
    /// Opens the queue store only; provider and staging database are
    /// connected on demand
    pub async fn build(settings: Settings) -> Result<Self> {
        let paths = settings.paths();
        info!(queue_dir = %paths.queue_dir.display(), "Opening queue store");

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let store = FsJobStore::open(&paths.queue_dir)
            .await
            .context("failed to open queue store")?;
        let lifecycle = Arc::new(JobLifecycleManager::new(
            Arc::new(store),
            time_provider.clone(),
        ));

        Ok(Self {
            settings,
            paths,
            time_provider,
            lifecycle,
        })
    }

    pub fn lifecycle(&self) -> Arc<JobLifecycleManager> {
        self.lifecycle.clone()
    }

    /// Track a provider job that was submitted outside this process
    pub async fn enqueue(&self, job_id: String, query: &str, location: &str) -> Result<JobRecord> {
        let record = JobRecord::new(job_id, query.trim(), location.trim(), self.time_provider.now());
        self.lifecycle
            .enqueue(record.clone())
            .await
            .with_context(|| format!("failed to enqueue {}", record.id))?;
        Ok(record)
    }

    fn provider(&self) -> Result<Arc<dyn SerpProvider>> {
        let provider = HttpSerpProvider::new(self.settings.http_provider_config()?)
            .context("failed to create provider client")?;
        Ok(Arc::new(provider))
    }

    async fn deduplicator(&self) -> Result<Arc<StagingDeduplicator>> {
        let url = &self.paths.staging_db_url;
        if let Some(parent) = url
            .strip_prefix("sqlite://")
            .and_then(|path| Path::new(path).parent())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        info!(url = %url, "Connecting staging database");
        let pool = create_pool(url)
            .await
            .context("staging database connection failed")?;
        run_migrations(&pool)
            .await
            .context("staging migration failed")?;

        Ok(Arc::new(StagingDeduplicator::new(Arc::new(
            SqliteStagingRepository::new(pool),
        ))))
    }

    pub async fn processor(&self) -> Result<PollingProcessor> {
        let deps = WorkflowDeps {
            archive: Arc::new(FsResultArchive::new(&self.paths.results_dir)),
            deduplicator: self.deduplicator().await?,
            renderer: Arc::new(HtmlReportRenderer::new()),
            artifacts: Arc::new(LocalArtifactStore::new(&self.paths.artifacts_dir)),
            downstream_policy: self.settings.downstream_policy(),
        };
        let workflow = Arc::new(SerpWorkflow::standard(deps, self.time_provider.clone()));

        Ok(PollingProcessor::new(
            self.lifecycle(),
            self.provider()?,
            workflow,
            self.time_provider.clone(),
            self.settings.processor_config(),
        ))
    }

    pub fn submitter(&self) -> Result<JobSubmitter> {
        Ok(JobSubmitter::new(
            self.provider()?,
            self.lifecycle(),
            self.time_provider.clone(),
            Arc::new(UuidProvider),
            self.settings.search_defaults(),
        ))
    }
}
