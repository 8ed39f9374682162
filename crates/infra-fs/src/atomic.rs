// Atomic file replacement: write a sibling temp file, then rename over the target

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// The temp file is flushed to disk before the rename, so the target never
/// points at unwritten data.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submitted.json");

        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed.json");
        // Leftover from a write that died before its rename
        tokio::fs::write(temp_path(&path), b"{\"queries\": [{\"id\"")
            .await
            .unwrap();

        write_atomic(&path, br#"{"queries":[]}"#).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), br#"{"queries":[]}"#);
        assert!(!temp_path(&path).exists());
    }
}
