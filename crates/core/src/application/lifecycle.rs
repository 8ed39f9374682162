// Job lifecycle management: the only component that changes queue membership
use crate::application::processor::constants::STATS_WINDOW;
use crate::application::recovery::{QueueRecovery, RecoveryReport};
use crate::domain::{
    CompletionMetadata, DomainError, FailureInfo, JobPatch, JobRecord, JobStatus, Queue,
};
use crate::error::{AppError, Result};
use crate::port::{JobStore, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a lifecycle move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// The job already sits in the target queue; nothing was written
    AlreadyInTarget,
    NotFound,
}

/// Queue counters and throughput figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub submitted_count: usize,
    pub in_progress_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    /// Completed share of all records, in percent
    pub completion_rate: f64,
    /// Mean over the most recent completed jobs with a processing time
    pub average_processing_time_ms: Option<f64>,
}

impl QueueStatistics {
    pub fn pending_work(&self) -> usize {
        self.submitted_count + self.in_progress_count
    }
}

/// Lookup order when locating a job; later stages win if a crash left copies
const LOOKUP_ORDER: [JobStatus; 4] = [
    JobStatus::Completed,
    JobStatus::Failed,
    JobStatus::InProgress,
    JobStatus::Submitted,
];

pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobLifecycleManager {
    pub fn new(store: Arc<dyn JobStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            time_provider,
        }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Validate and append a new record to `submitted`
    pub async fn enqueue(&self, record: JobRecord) -> Result<()> {
        record.validate()?;
        if record.status != JobStatus::Submitted {
            return Err(AppError::Validation(format!(
                "job {} must be enqueued as submitted, got {}",
                record.id, record.status
            )));
        }
        self.store.insert(&record).await?;
        info!(job_id = %record.id, query = %record.query, "Job enqueued");
        Ok(())
    }

    pub async fn list(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        Ok(self.store.load(status).await?.queries)
    }

    /// Repair queue membership after an interrupted move
    pub async fn reconcile(&self) -> Result<RecoveryReport> {
        QueueRecovery::new(self.store()).reconcile().await
    }

    pub async fn move_to_in_progress(&self, job_id: &str) -> Result<MoveOutcome> {
        let patch = JobPatch::Start {
            started_at: self.time_provider.now(),
        };
        self.transition(job_id, patch).await
    }

    pub async fn move_to_completed(
        &self,
        job_id: &str,
        metadata: CompletionMetadata,
    ) -> Result<MoveOutcome> {
        let patch = JobPatch::Complete {
            completed_at: self.time_provider.now(),
            metadata,
        };
        self.transition(job_id, patch).await
    }

    pub async fn move_to_failed(&self, job_id: &str, failure: FailureInfo) -> Result<MoveOutcome> {
        let patch = JobPatch::Fail {
            failed_at: self.time_provider.now(),
            failure,
        };
        self.transition(job_id, patch).await
    }

    async fn transition(&self, job_id: &str, patch: JobPatch) -> Result<MoveOutcome> {
        let target = patch.target_status();

        let Some(current) = self.locate(job_id).await? else {
            warn!(job_id = %job_id, target = %target, "Job not found in any queue");
            return Ok(MoveOutcome::NotFound);
        };

        if current == target {
            debug!(job_id = %job_id, queue = %target, "Job already in target queue");
            return Ok(MoveOutcome::AlreadyInTarget);
        }

        if !current.can_transition_to(target) {
            return Err(DomainError::InvalidStateTransition {
                from: current.to_string(),
                to: target.to_string(),
            }
            .into());
        }

        if self.store.move_job(job_id, current, target, patch).await? {
            info!(job_id = %job_id, from = %current, to = %target, "Job moved");
            Ok(MoveOutcome::Moved)
        } else {
            warn!(job_id = %job_id, from = %current, "Job vanished before move");
            Ok(MoveOutcome::NotFound)
        }
    }

    async fn locate(&self, job_id: &str) -> Result<Option<JobStatus>> {
        for status in LOOKUP_ORDER {
            if self.store.load(status).await?.contains(job_id) {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    pub async fn statistics(&self) -> Result<QueueStatistics> {
        let submitted = self.store.load(JobStatus::Submitted).await?;
        let in_progress = self.store.load(JobStatus::InProgress).await?;
        let completed = self.store.load(JobStatus::Completed).await?;
        let failed = self.store.load(JobStatus::Failed).await?;

        let total = submitted.len() + in_progress.len() + completed.len() + failed.len();
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed.len() as f64 / total as f64 * 100.0
        };

        Ok(QueueStatistics {
            submitted_count: submitted.len(),
            in_progress_count: in_progress.len(),
            completed_count: completed.len(),
            failed_count: failed.len(),
            completion_rate,
            average_processing_time_ms: recent_average(&completed),
        })
    }
}

fn recent_average(completed: &Queue) -> Option<f64> {
    let recent: Vec<i64> = completed
        .queries
        .iter()
        .rev()
        .filter_map(|job| job.processing_time_ms)
        .take(STATS_WINDOW)
        .collect();

    if recent.is_empty() {
        return None;
    }
    Some(recent.iter().sum::<i64>() as f64 / recent.len() as f64)
}
