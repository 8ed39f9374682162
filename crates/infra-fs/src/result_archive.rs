// Raw payload archive: <dir>/<job_id>.json

use crate::atomic::write_atomic;
use async_trait::async_trait;
use serpwatch_core::port::{ArtifactError, ResultArchive};
use std::path::PathBuf;
use tracing::debug;

pub struct FsResultArchive {
    dir: PathBuf,
}

impl FsResultArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

#[async_trait]
impl ResultArchive for FsResultArchive {
    async fn save_raw(
        &self,
        job_id: &str,
        payload: &serde_json::Value,
    ) -> Result<String, ArtifactError> {
        if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id.starts_with('.') {
            return Err(ArtifactError::Rejected(format!(
                "job id '{}' is not a valid file name",
                job_id
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArtifactError::Io(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.path_for(job_id);
        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| ArtifactError::Rejected(e.to_string()))?;
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| ArtifactError::Io(format!("{}: {}", path.display(), e)))?;

        debug!(job_id = %job_id, path = %path.display(), "Raw results archived");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_archives_payload() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsResultArchive::new(dir.path().join("results"));
        let payload = json!({"results": [{"content": {"url": "x"}}]});

        let location = archive.save_raw("j1", &payload).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&location).await.unwrap()).unwrap();
        assert_eq!(written, payload);
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsResultArchive::new(dir.path());

        for id in ["../escape", "a/b", ""] {
            assert!(matches!(
                archive.save_raw(id, &json!({})).await,
                Err(ArtifactError::Rejected(_))
            ));
        }
    }
}
