// Artifact Ports
// Object storage for rendered reports and the raw results archive

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Artifact I/O failed: {0}")]
    Io(String),

    #[error("Artifact rejected: {0}")]
    Rejected(String),
}

/// Key/value object storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key`, returning the location it was written to
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ArtifactError>;
}

/// Archive of raw provider payloads, one document per job
#[async_trait]
pub trait ResultArchive: Send + Sync {
    async fn save_raw(
        &self,
        job_id: &str,
        payload: &serde_json::Value,
    ) -> Result<String, ArtifactError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingArtifactStore {
        objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
        fail: AtomicBool,
    }

    impl RecordingArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }

        pub fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .map(|(bytes, _)| bytes.clone())
        }
    }

    #[async_trait]
    impl ArtifactStore for RecordingArtifactStore {
        async fn put(
            &self,
            key: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<String, ArtifactError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ArtifactError::Io("bucket unreachable".to_string()));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), (bytes, content_type.to_string()));
            Ok(format!("mem://{}", key))
        }
    }

    #[derive(Default)]
    pub struct RecordingArchive {
        saved: Mutex<HashMap<String, serde_json::Value>>,
    }

    impl RecordingArchive {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, job_id: &str) -> Option<serde_json::Value> {
            self.saved.lock().unwrap().get(job_id).cloned()
        }
    }

    #[async_trait]
    impl ResultArchive for RecordingArchive {
        async fn save_raw(
            &self,
            job_id: &str,
            payload: &serde_json::Value,
        ) -> Result<String, ArtifactError> {
            self.saved
                .lock()
                .unwrap()
                .insert(job_id.to_string(), payload.clone());
            Ok(format!("mem://results/{}.json", job_id))
        }
    }
}
