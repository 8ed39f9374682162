// JSON-document JobStore Implementation
//
// Layout: <dir>/<queue>.json holding {"queries": [...]}, plus
// <dir>/<queue>.backup.json with the state before the last move out of it.

use crate::atomic::write_atomic;
use async_trait::async_trait;
use serpwatch_core::domain::{JobPatch, JobRecord, JobStatus, Queue, QueueName};
use serpwatch_core::error::{AppError, Result};
use serpwatch_core::port::job_store::{apply_move, ensure_unique};
use serpwatch_core::port::JobStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct FsJobStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FsJobStore {
    /// Open (creating if needed) a queue directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Persistence(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, queue: QueueName) -> PathBuf {
        self.dir.join(format!("{}.json", queue.queue_name()))
    }

    pub fn backup_path(&self, queue: QueueName) -> PathBuf {
        self.dir.join(format!("{}.backup.json", queue.queue_name()))
    }

    async fn read(&self, path: &Path) -> Result<Queue> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Queue::default()),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Queue::default());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Persistence(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    async fn write(&self, path: &Path, queue: &Queue) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(queue)?;
        write_atomic(path, &bytes).await.map_err(|e| {
            AppError::Persistence(format!("cannot write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), jobs = %queue.len(), "Queue document written");
        Ok(())
    }
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn load(&self, queue: QueueName) -> Result<Queue> {
        self.read(&self.document_path(queue)).await
    }

    async fn save(&self, queue: QueueName, jobs: &Queue) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(&self.document_path(queue), jobs).await
    }

    async fn insert(&self, record: &JobRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = Vec::with_capacity(JobStatus::ALL.len());
        for status in JobStatus::ALL {
            all.push((status, self.load(status).await?));
        }
        ensure_unique(&all, &record.id)?;

        let mut submitted = all
            .into_iter()
            .find(|(status, _)| *status == JobStatus::Submitted)
            .map(|(_, queue)| queue)
            .unwrap_or_default();
        submitted.push(record.clone());
        self.write(&self.document_path(JobStatus::Submitted), &submitted)
            .await
    }

    async fn move_job(
        &self,
        job_id: &str,
        from: QueueName,
        to: QueueName,
        patch: JobPatch,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut source = self.load(from).await?;
        let mut target = self.load(to).await?;
        let prior = source.clone();

        if !apply_move(&mut source, &mut target, job_id, &patch)? {
            return Ok(false);
        }

        // Destination before source: a crash in between leaves a duplicate
        // that reconciliation removes, never a lost record.
        self.write(&self.backup_path(from), &prior).await?;
        self.write(&self.document_path(to), &target).await?;
        self.write(&self.document_path(from), &source).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serpwatch_core::domain::{CompletionMetadata, JobRecord};

    async fn store() -> (tempfile::TempDir, FsJobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::open(dir.path().join("queues")).await.unwrap();
        (dir, store)
    }

    fn record(id: &str) -> JobRecord {
        JobRecord::new(id, "plumbers near me", "Boston, MA", Utc::now())
    }

    #[tokio::test]
    async fn test_missing_documents_load_empty() {
        let (_dir, store) = store().await;
        for status in JobStatus::ALL {
            assert!(store.load(status).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_insert_writes_queue_document() {
        let (_dir, store) = store().await;
        store.insert(&record("j1")).await.unwrap();

        let raw = tokio::fs::read_to_string(store.document_path(JobStatus::Submitted))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["queries"][0]["id"], "j1");
        assert_eq!(value["queries"][0]["status"], "submitted");
        assert!(value["queries"][0]["submittedAt"].is_string());
    }

    #[tokio::test]
    async fn test_insert_rejects_id_in_any_queue() {
        let (_dir, store) = store().await;
        store
            .save(JobStatus::Completed, &Queue::new(vec![record("j1")]))
            .await
            .unwrap();

        assert!(matches!(
            store.insert(&record("j1")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_move_relocates_and_writes_backup() {
        let (_dir, store) = store().await;
        store.insert(&record("j1")).await.unwrap();
        store.insert(&record("j2")).await.unwrap();

        let moved = store
            .move_job(
                "j1",
                JobStatus::Submitted,
                JobStatus::InProgress,
                JobPatch::Start {
                    started_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert!(moved);
        let submitted = store.load(JobStatus::Submitted).await.unwrap();
        let in_progress = store.load(JobStatus::InProgress).await.unwrap();
        assert!(!submitted.contains("j1"));
        assert!(in_progress.get("j1").unwrap().started_at.is_some());

        let backup = store
            .read(&store.backup_path(JobStatus::Submitted))
            .await
            .unwrap();
        assert_eq!(backup.len(), 2);
        assert!(backup.contains("j1"));
    }

    #[tokio::test]
    async fn test_move_of_absent_job_returns_false() {
        let (_dir, store) = store().await;
        let moved = store
            .move_job(
                "ghost",
                JobStatus::InProgress,
                JobStatus::Completed,
                JobPatch::Complete {
                    completed_at: Utc::now(),
                    metadata: CompletionMetadata {
                        processing_time_ms: 1,
                        summary: None,
                    },
                },
            )
            .await
            .unwrap();

        assert!(!moved);
        assert!(!store.backup_path(JobStatus::InProgress).exists());
        assert!(!store.document_path(JobStatus::Completed).exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_persistence_error() {
        let (_dir, store) = store().await;
        tokio::fs::write(store.document_path(JobStatus::InProgress), b"{not json")
            .await
            .unwrap();

        let err = store.load(JobStatus::InProgress).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
