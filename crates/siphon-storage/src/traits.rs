//! Storage abstraction trait
//!
//! All storage backends the pipeline can read uploads from must
//! implement this trait. The upload path (presigned PUT) is handled
//! outside the pipeline; this side only reads, inspects and deletes.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Size and user metadata of a stored object.
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size_bytes: i64,
    /// User metadata; S3 lower-cases keys (`uploadid`, `tenantid`).
    pub metadata: HashMap<String, String>,
}

/// Read-side object storage abstraction.
///
/// Keys are opaque to the pipeline; they come from upload notifications
/// and job rows. `get_stream` is the large-file path — the parsers never
/// hold a whole file in memory. `get_bytes` is for whole-content
/// hashing, where the full read is needed anyway.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stream an object's content.
    async fn get_stream(&self, key: &str) -> StorageResult<Pin<Box<dyn AsyncRead + Send>>>;

    /// Fetch an object's full content.
    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Object size and user metadata; `None` if the key does not exist.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.head(key).await?.is_some())
    }

    /// Store an object with user metadata. Used by fixtures and by
    /// development tooling; production uploads arrive via presigned PUT.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StorageResult<()>;

    /// Delete an object (current version).
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete a specific object version; falls back to a plain delete on
    /// unversioned backends or when no version id is known.
    async fn delete_version(&self, key: &str, version_id: Option<&str>) -> StorageResult<()>;
}
