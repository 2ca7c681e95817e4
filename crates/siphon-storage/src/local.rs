use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::traits::{ObjectHead, ObjectStorage, StorageError, StorageResult};

/// Local filesystem storage implementation.
///
/// Object user metadata lives in a JSON sidecar next to the object file,
/// mirroring what S3 returns from a head request. Used by tests and
/// single-node development setups.
#[derive(Clone)]
pub struct LocalObjectStorage {
    base_path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    metadata: HashMap<String, String>,
}

impl LocalObjectStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalObjectStorage { base_path })
    }

    /// Convert an object key to a filesystem path, rejecting keys that
    /// could escape the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    fn sidecar_path(path: &PathBuf) -> PathBuf {
        let mut os = path.clone().into_os_string();
        os.push(".head.json");
        PathBuf::from(os)
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn get_stream(&self, key: &str) -> StorageResult<Pin<Box<dyn AsyncRead + Send>>> {
        let path = self.key_to_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::DownloadFailed(e.to_string())
            }
        })?;
        Ok(Box::pin(file))
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::DownloadFailed(e.to_string())
            }
        })
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>> {
        let path = self.key_to_path(key)?;
        let meta = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        };

        let sidecar = match fs::read(Self::sidecar_path(&path)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
            Err(_) => Sidecar::default(),
        };

        Ok(Some(ObjectHead {
            size_bytes: meta.len() as i64,
            metadata: sidecar.metadata,
        }))
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        file.write_all(&data)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            metadata,
        };
        let raw = serde_json::to_vec(&sidecar)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        fs::write(Self::sidecar_path(&path), raw)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
        }
        let _ = fs::remove_file(Self::sidecar_path(&path)).await;
        Ok(())
    }

    async fn delete_version(&self, key: &str, _version_id: Option<&str>) -> StorageResult<()> {
        // The local backend is unversioned.
        self.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn put_head_get_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path()).await.unwrap();

        let mut metadata = HashMap::new();
        metadata.insert("uploadid".to_string(), "u-1".to_string());
        metadata.insert("tenantid".to_string(), "t-1".to_string());

        storage
            .put(
                "raw/orders.csv",
                Bytes::from_static(b"id,name\n1,a\n"),
                "text/csv",
                metadata,
            )
            .await
            .unwrap();

        let head = storage.head("raw/orders.csv").await.unwrap().unwrap();
        assert_eq!(head.size_bytes, 12);
        assert_eq!(head.metadata.get("uploadid").unwrap(), "u-1");

        let mut stream = storage.get_stream("raw/orders.csv").await.unwrap();
        let mut content = String::new();
        stream.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "id,name\n1,a\n");
    }

    #[tokio::test]
    async fn head_missing_is_none() {
        let dir = tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path()).await.unwrap();
        assert!(storage.head("nope").await.unwrap().is_none());
        assert!(!storage.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path()).await.unwrap();

        let result = storage.get_bytes("../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn delete_nonexistent_is_ok() {
        let dir = tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path()).await.unwrap();
        assert!(storage.delete("missing/file.csv").await.is_ok());
        assert!(storage.delete_version("missing", Some("v1")).await.is_ok());
    }
}
