// Local-directory ArtifactStore (stand-in for object storage)

use async_trait::async_trait;
use serpwatch_core::port::{ArtifactError, ArtifactStore};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are relative paths below the root; anything that could escape it
    /// is rejected
    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ArtifactError::Rejected(format!("invalid key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ArtifactError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ArtifactError::Io(format!("{}: {}", path.display(), e)))?;

        debug!(key = %key, content_type = %content_type, bytes = %size, "Artifact stored");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let location = store
            .put("reports/j1.html", b"<html></html>".to_vec(), "text/html")
            .await
            .unwrap();

        assert!(location.ends_with("j1.html"));
        assert_eq!(
            tokio::fs::read(dir.path().join("reports/j1.html"))
                .await
                .unwrap(),
            b"<html></html>"
        );
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("artifacts"));

        for key in ["../outside.html", "/etc/passwd", "reports/../../x", ""] {
            assert!(matches!(
                store.put(key, vec![1], "application/octet-stream").await,
                Err(ArtifactError::Rejected(_))
            ));
        }
    }
}
