//! Fast tier: JSON files under a local directory.

use crate::{validate_key, ObjectStore, Result, StoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Objects stored as files below `root`, one file per key.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, part| path.join(part)))
    }
}

impl ObjectStore for LocalFileStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path.display().to_string(), e)),
        }
    }

    /// Writes go to a sibling temp file and are renamed into place, so a
    /// reader never sees a half-written document.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::io(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(path.display().to_string(), e))?;
        log::debug!("[WCI] store: wrote {} bytes to {}", body.len(), path.display());
        Ok(())
    }
}
