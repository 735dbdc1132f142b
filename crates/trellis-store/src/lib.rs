mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A store for opaque blobs keyed by relative, `/`-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (create or overwrite) an object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read an object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Read an object, returning `None` if it does not exist.
    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Keys must be relative and must not climb out of the store root.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

// -- Key helpers --

pub const UPLOADS_PREFIX: &str = "uploads";

/// `uploads/{unix_millis}-{suffix}-{filename}`. `filename` must already be
/// sanitized to a single path segment.
pub fn upload_key(unix_millis: i64, suffix: &str, filename: &str) -> String {
    format!("{UPLOADS_PREFIX}/{unix_millis}-{suffix}-{filename}")
}

/// Thumbnails live beside their source as `thumb-{name}`.
pub fn thumbnail_key(stored_path: &str) -> String {
    match stored_path.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/thumb-{name}"),
        None => format!("thumb-{stored_path}"),
    }
}
