// Crash recovery: restore the exactly-one-queue invariant on startup
use crate::domain::{JobStatus, Queue};
use crate::error::Result;
use crate::port::JobStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// (job id, queue it was removed from)
    pub removed: Vec<(String, JobStatus)>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Queue reconciliation service
///
/// A move writes the destination before the source, so a crash in between
/// leaves the record in both queues. The later-stage copy is authoritative.
pub struct QueueRecovery {
    store: Arc<dyn JobStore>,
}

impl QueueRecovery {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self) -> Result<RecoveryReport> {
        let mut submitted = self.store.load(JobStatus::Submitted).await?;
        let mut in_progress = self.store.load(JobStatus::InProgress).await?;
        let mut completed = self.store.load(JobStatus::Completed).await?;
        let mut failed = self.store.load(JobStatus::Failed).await?;

        let mut report = RecoveryReport::default();

        let mut changed = [false; 4];
        changed[2] = dedupe_within(&mut completed, JobStatus::Completed, &mut report);
        changed[3] = dedupe_within(&mut failed, JobStatus::Failed, &mut report);
        changed[1] = dedupe_within(&mut in_progress, JobStatus::InProgress, &mut report);
        changed[0] = dedupe_within(&mut submitted, JobStatus::Submitted, &mut report);

        let completed_ids = ids(&completed);
        for id in ids(&failed).intersection(&completed_ids) {
            error!(
                job_id = %id,
                "Job present in both completed and failed, keeping completed copy"
            );
        }
        changed[3] |= drop_present(&mut failed, JobStatus::Failed, &[&completed_ids], &mut report);

        let failed_ids = ids(&failed);
        changed[1] |= drop_present(
            &mut in_progress,
            JobStatus::InProgress,
            &[&completed_ids, &failed_ids],
            &mut report,
        );

        let in_progress_ids = ids(&in_progress);
        changed[0] |= drop_present(
            &mut submitted,
            JobStatus::Submitted,
            &[&in_progress_ids, &completed_ids, &failed_ids],
            &mut report,
        );

        let queues = [
            (JobStatus::Submitted, &submitted),
            (JobStatus::InProgress, &in_progress),
            (JobStatus::Completed, &completed),
            (JobStatus::Failed, &failed),
        ];
        for ((status, queue), dirty) in queues.into_iter().zip(changed) {
            if dirty {
                self.store.save(status, queue).await?;
            }
        }

        if report.is_clean() {
            info!("Queue reconciliation found no duplicates");
        } else {
            info!(removed = %report.removed.len(), "Queue reconciliation repaired duplicates");
        }
        Ok(report)
    }
}

fn ids(queue: &Queue) -> HashSet<String> {
    queue.queries.iter().map(|job| job.id.clone()).collect()
}

fn drop_present(
    queue: &mut Queue,
    status: JobStatus,
    later: &[&HashSet<String>],
    report: &mut RecoveryReport,
) -> bool {
    let before = queue.len();
    queue.queries.retain(|job| {
        let stale = later.iter().any(|set| set.contains(&job.id));
        if stale {
            warn!(job_id = %job.id, queue = %status, "Removing stale copy left by interrupted move");
            report.removed.push((job.id.clone(), status));
        }
        !stale
    });
    queue.len() != before
}

fn dedupe_within(queue: &mut Queue, status: JobStatus, report: &mut RecoveryReport) -> bool {
    let mut seen = HashSet::new();
    let before = queue.len();
    queue.queries.retain(|job| {
        let first = seen.insert(job.id.clone());
        if !first {
            warn!(job_id = %job.id, queue = %status, "Removing repeated entry");
            report.removed.push((job.id.clone(), status));
        }
        first
    });
    queue.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobRecord;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use chrono::Utc;

    fn job(id: &str, status: JobStatus) -> JobRecord {
        let mut record = JobRecord::new(id, "q", "l", Utc::now());
        record.status = status;
        record
    }

    #[tokio::test]
    async fn test_removes_copy_from_earlier_queue() {
        let store = Arc::new(InMemoryJobStore::new());
        store.seed(JobStatus::Submitted, job("j1", JobStatus::Submitted));
        store.seed(JobStatus::InProgress, job("j1", JobStatus::InProgress));
        store.seed(JobStatus::Submitted, job("j2", JobStatus::Submitted));

        let report = QueueRecovery::new(store.clone()).reconcile().await.unwrap();

        assert_eq!(report.removed, vec![("j1".to_string(), JobStatus::Submitted)]);
        assert!(!store.snapshot(JobStatus::Submitted).contains("j1"));
        assert!(store.snapshot(JobStatus::Submitted).contains("j2"));
        assert!(store.snapshot(JobStatus::InProgress).contains("j1"));
    }

    #[tokio::test]
    async fn test_completed_wins_over_failed() {
        let store = Arc::new(InMemoryJobStore::new());
        store.seed(JobStatus::Completed, job("j1", JobStatus::Completed));
        store.seed(JobStatus::Failed, job("j1", JobStatus::Failed));
        store.seed(JobStatus::InProgress, job("j1", JobStatus::InProgress));

        let report = QueueRecovery::new(store.clone()).reconcile().await.unwrap();

        assert_eq!(report.removed.len(), 2);
        assert!(store.snapshot(JobStatus::Completed).contains("j1"));
        assert!(store.snapshot(JobStatus::Failed).is_empty());
        assert!(store.snapshot(JobStatus::InProgress).is_empty());
    }

    #[tokio::test]
    async fn test_clean_queues_are_untouched() {
        let store = Arc::new(InMemoryJobStore::new());
        store.seed(JobStatus::Submitted, job("j1", JobStatus::Submitted));
        store.set_fail_writes(true);

        let report = QueueRecovery::new(store.clone()).reconcile().await.unwrap();
        assert!(report.is_clean());
    }
}
