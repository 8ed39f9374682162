// Job Store Port (Interface)

use crate::domain::{JobPatch, JobRecord, Queue, QueueName};
use crate::error::{AppError, Result};
use async_trait::async_trait;

/// Durable persistence of job records partitioned into one queue per status.
///
/// Implementations assume a single writer process. Only the lifecycle manager
/// should change queue membership.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a queue (missing documents load as empty)
    async fn load(&self, queue: QueueName) -> Result<Queue>;

    /// Replace a queue document
    async fn save(&self, queue: QueueName, jobs: &Queue) -> Result<()>;

    /// Append a new record to the submitted queue.
    ///
    /// # Errors
    /// - `AppError::Conflict` if the id already exists in any queue
    async fn insert(&self, record: &JobRecord) -> Result<()>;

    /// Move a job between queues as one logical operation: find it in `from`,
    /// apply `patch`, append it to `to`, remove it from `from`, persist both and
    /// refresh the backup of `from`'s prior state.
    ///
    /// # Returns
    /// `false` when the job is not in `from` (already moved, never existed)
    async fn move_job(
        &self,
        job_id: &str,
        from: QueueName,
        to: QueueName,
        patch: JobPatch,
    ) -> Result<bool>;
}

/// In-memory part of a move shared by store implementations.
///
/// Returns `Ok(false)` without touching either queue when the job is absent
/// from `source`. A stale copy already sitting in `target` is replaced.
pub fn apply_move(
    source: &mut Queue,
    target: &mut Queue,
    job_id: &str,
    patch: &JobPatch,
) -> Result<bool> {
    let Some(index) = source.position(job_id) else {
        return Ok(false);
    };

    let mut record = source.queries[index].clone();
    patch.apply(&mut record)?;

    target.remove(job_id);
    target.push(record);
    source.remove(job_id);
    Ok(true)
}

/// Id uniqueness check across every queue, used before inserts
pub fn ensure_unique(queues: &[(QueueName, Queue)], job_id: &str) -> Result<()> {
    for (name, queue) in queues {
        if queue.contains(job_id) {
            return Err(AppError::Conflict(format!(
                "job {} already exists in queue {}",
                job_id, name
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory JobStore with switchable write failures
    #[derive(Default)]
    pub struct InMemoryJobStore {
        queues: Mutex<HashMap<QueueName, Queue>>,
        backups: Mutex<HashMap<QueueName, Queue>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent write fail with a persistence error
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Place a record straight into a queue, bypassing lifecycle checks
        pub fn seed(&self, queue: QueueName, record: JobRecord) {
            self.queues
                .lock()
                .unwrap()
                .entry(queue)
                .or_default()
                .push(record);
        }

        pub fn snapshot(&self, queue: QueueName) -> Queue {
            self.queues
                .lock()
                .unwrap()
                .get(&queue)
                .cloned()
                .unwrap_or_default()
        }

        pub fn backup(&self, queue: QueueName) -> Option<Queue> {
            self.backups.lock().unwrap().get(&queue).cloned()
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Persistence(
                    "in-memory store is read-only".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn load(&self, queue: QueueName) -> Result<Queue> {
            Ok(self.snapshot(queue))
        }

        async fn save(&self, queue: QueueName, jobs: &Queue) -> Result<()> {
            self.check_writable()?;
            self.queues.lock().unwrap().insert(queue, jobs.clone());
            Ok(())
        }

        async fn insert(&self, record: &JobRecord) -> Result<()> {
            self.check_writable()?;
            let mut queues = self.queues.lock().unwrap();
            let all: Vec<(QueueName, Queue)> = JobStatus::ALL
                .iter()
                .map(|s| (*s, queues.get(s).cloned().unwrap_or_default()))
                .collect();
            ensure_unique(&all, &record.id)?;
            queues
                .entry(JobStatus::Submitted)
                .or_default()
                .push(record.clone());
            Ok(())
        }

        async fn move_job(
            &self,
            job_id: &str,
            from: QueueName,
            to: QueueName,
            patch: JobPatch,
        ) -> Result<bool> {
            self.check_writable()?;
            let mut queues = self.queues.lock().unwrap();
            let mut source = queues.get(&from).cloned().unwrap_or_default();
            let mut target = queues.get(&to).cloned().unwrap_or_default();
            let prior = source.clone();

            if !apply_move(&mut source, &mut target, job_id, &patch)? {
                return Ok(false);
            }

            self.backups.lock().unwrap().insert(from, prior);
            queues.insert(to, target);
            queues.insert(from, source);
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use chrono::Utc;

    #[test]
    fn test_apply_move_missing_job_is_noop() {
        let mut source = Queue::default();
        let mut target = Queue::default();
        let moved = apply_move(
            &mut source,
            &mut target,
            "ghost",
            &JobPatch::Start {
                started_at: Utc::now(),
            },
        )
        .unwrap();
        assert!(!moved);
        assert!(target.is_empty());
    }

    #[test]
    fn test_apply_move_patches_and_relocates() {
        let now = Utc::now();
        let mut source = Queue::new(vec![JobRecord::new("j1", "q", "l", now)]);
        let mut target = Queue::default();

        let moved = apply_move(
            &mut source,
            &mut target,
            "j1",
            &JobPatch::Start { started_at: now },
        )
        .unwrap();

        assert!(moved);
        assert!(source.is_empty());
        let record = target.get("j1").unwrap();
        assert_eq!(record.status, JobStatus::InProgress);
        assert_eq!(record.started_at, Some(now));
    }

    #[test]
    fn test_apply_move_rejects_illegal_patch_without_changes() {
        let now = Utc::now();
        let mut source = Queue::new(vec![JobRecord::new("j1", "q", "l", now)]);
        let mut target = Queue::default();
        let patch = JobPatch::Complete {
            completed_at: now,
            metadata: crate::domain::CompletionMetadata {
                processing_time_ms: 1,
                summary: None,
            },
        };

        assert!(apply_move(&mut source, &mut target, "j1", &patch).is_err());
        assert!(source.contains("j1"));
        assert!(target.is_empty());
    }
}
