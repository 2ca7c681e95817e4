use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::traits::{ObjectHead, ObjectStorage, StorageError, StorageResult};

/// S3 storage implementation
#[derive(Clone)]
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
}

impl S3ObjectStorage {
    /// Create a new S3ObjectStorage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket holding raw uploads
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO, "http://localhost:4566" for LocalStack)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            // S3-compatible providers need path-style addressing
            let mut builder = aws_sdk_s3::Config::builder()
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = config.credentials_provider().into_iter().next() {
                builder = builder.credentials_provider(provider);
            }
            Client::from_conf(builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3ObjectStorage { client, bucket })
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn get_stream(&self, key: &str) -> StorageResult<Pin<Box<dyn AsyncRead + Send>>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    tracing::error!(error = %service_error, bucket = %self.bucket, key = %key, "S3 get failed");
                    StorageError::DownloadFailed(service_error.to_string())
                }
            })?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    tracing::error!(error = %service_error, bucket = %self.bucket, key = %key, "S3 get failed");
                    StorageError::DownloadFailed(service_error.to_string())
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectHead {
                size_bytes: output.content_length().unwrap_or(0),
                metadata: output.metadata().cloned().unwrap_or_default(),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    tracing::error!(error = %service_error, bucket = %self.bucket, key = %key, "S3 head failed");
                    Err(StorageError::BackendError(service_error.to_string()))
                }
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StorageResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data));
        for (k, v) in metadata {
            request = request.metadata(k, v);
        }

        request.send().await.map_err(|e| {
            let service_error = e.into_service_error();
            tracing::error!(error = %service_error, bucket = %self.bucket, key = %key, "S3 put failed");
            StorageError::UploadFailed(service_error.to_string())
        })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_version(key, None).await
    }

    async fn delete_version(&self, key: &str, version_id: Option<&str>) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                tracing::error!(error = %service_error, bucket = %self.bucket, key = %key, "S3 delete failed");
                StorageError::DeleteFailed(service_error.to_string())
            })?;
        Ok(())
    }
}
