// Staging Repository Port (Interface)

use crate::domain::{StagingRecord, StoredStagingRecord};
use crate::error::Result;
use async_trait::async_trait;

/// Relational staging table keyed by the provider's external job id.
///
/// The store enforces uniqueness of `external_job_id`; a second insert for the
/// same id must fail with `AppError::Conflict`.
#[async_trait]
pub trait StagingRepository: Send + Sync {
    async fn find_by_external_id(&self, external_job_id: &str)
        -> Result<Option<StoredStagingRecord>>;

    /// Insert a record, returning its generated row id
    async fn insert(&self, record: &StagingRecord) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::StagingStatus;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory staging table with a unique constraint on the external id
    #[derive(Default)]
    pub struct InMemoryStagingRepository {
        rows: Mutex<Vec<StoredStagingRecord>>,
        stale_reads: AtomicUsize,
        fail_inserts: AtomicBool,
        calls: AtomicUsize,
    }

    impl InMemoryStagingRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// The next `count` lookups report nothing, simulating a concurrent
        /// writer that lands between check and insert
        pub fn set_stale_reads(&self, count: usize) {
            self.stale_reads.store(count, Ordering::SeqCst);
        }

        pub fn set_fail_inserts(&self, fail: bool) {
            self.fail_inserts.store(fail, Ordering::SeqCst);
        }

        pub fn set_status(&self, external_job_id: &str, status: StagingStatus) {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows
                .iter_mut()
                .find(|r| r.record.external_job_id == external_job_id)
            {
                row.record.status = status;
            }
        }

        /// Lookups and inserts seen so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn rows(&self) -> Vec<StoredStagingRecord> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StagingRepository for InMemoryStagingRepository {
        async fn find_by_external_id(
            &self,
            external_job_id: &str,
        ) -> Result<Option<StoredStagingRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stale = self
                .stale_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(None);
            }

            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.record.external_job_id == external_job_id)
                .cloned())
        }

        async fn insert(&self, record: &StagingRecord) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(AppError::Database("database is locked".to_string()));
            }

            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|r| r.record.external_job_id == record.external_job_id)
            {
                return Err(AppError::Conflict(format!(
                    "staging record for {} already exists",
                    record.external_job_id
                )));
            }

            let id = rows.len() as i64 + 1;
            rows.push(StoredStagingRecord {
                id,
                record: record.clone(),
            });
            Ok(id)
        }
    }
}
