use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{validate_key, ObjectStore, StoreError};

/// Filesystem-backed store rooted at `base_dir`.
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))?;
        tracing::debug!(key, bytes = data.len(), "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Internal(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Internal(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(prefix)?;
        let mut keys = Vec::new();
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::Internal(format!(
                        "list {}: {e}",
                        current.display()
                    )))
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::Internal(format!("read_dir entry: {e}")))?
            {
                let path = entry.path();
                let ft = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::Internal(format!("file_type: {e}")))?;
                if ft.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.base_dir) {
                    let key: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
                    keys.push(key.join("/"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Internal(format!("exists {}: {e}", path.display())))
    }
}
