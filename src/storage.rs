// Scratch storage for batch uploads
//
// Files are written as `<batch_id>_<filename>` and never deleted.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::errors::StorageError;

#[derive(Debug, Clone)]
pub struct ScratchStorage {
    dir: PathBuf,
}

impl ScratchStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the scratch directory if needed
    pub fn ensure_dir(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
            path: self.dir.display().to_string(),
            source,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a file of this batch will be stored at
    pub fn path_for(&self, batch_id: &str, filename: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", batch_id, filename))
    }

    /// Write `bytes` for `filename` (already sanitized) and return the stored path.
    ///
    /// An existing file with the same name is overwritten.
    pub async fn persist(
        &self,
        batch_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        if filename.is_empty() {
            return Err(StorageError::UnusableFilename(filename.to_string()));
        }

        let path = self.path_for(batch_id, filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_names_file_by_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(dir.path().join("uploads"));
        storage.ensure_dir().unwrap();

        let path = storage.persist("1700000000", "a.png", b"abc").await.unwrap();
        assert_eq!(path, dir.path().join("uploads").join("1700000000_a.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_persist_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(dir.path());
        let err = storage.persist("1", "", b"abc").await.unwrap_err();
        assert!(matches!(err, StorageError::UnusableFilename(_)));
    }

    #[tokio::test]
    async fn test_persist_fails_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(dir.path().join("missing"));
        let err = storage.persist("1", "a.png", b"abc").await.unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
    }
}
