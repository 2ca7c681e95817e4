use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use siphon_bus::EventBus;
use siphon_core::constants::UNKNOWN_SENTINEL;
use siphon_core::{
    detect_file_type, sha256_hex, IngestError, IngestEvent, IngestJob, IngestJobStatus,
    ObjectRecord, UploadNotification,
};
use siphon_db::IngestJobStore;
use siphon_storage::{ObjectHead, ObjectStorage};

/// User metadata keys set by the presigned-upload issuer. S3 lower-cases
/// metadata keys in transit.
const METADATA_UPLOAD_ID: &str = "uploadid";
const METADATA_TENANT_ID: &str = "tenantid";

/// Validates completed uploads and admits them into the pipeline.
///
/// Each notification resolves in exactly one way: the job advances to
/// `queued` with a success event, moves to a terminal status with its
/// error event, or the redundant object is deleted. Infrastructure
/// failures (database, storage, bus) propagate instead, leaving the
/// message unacknowledged for redelivery.
pub struct UploadCompletionHandler {
    jobs: Arc<dyn IngestJobStore>,
    storage: Arc<dyn ObjectStorage>,
    bus: EventBus,
}

impl UploadCompletionHandler {
    pub fn new(
        jobs: Arc<dyn IngestJobStore>,
        storage: Arc<dyn ObjectStorage>,
        bus: EventBus,
    ) -> Self {
        UploadCompletionHandler { jobs, storage, bus }
    }

    /// Handle one raw notification body.
    #[tracing::instrument(skip_all)]
    pub async fn handle(&self, body: &str) -> Result<()> {
        if let Err(err) = self.process(body).await {
            tracing::error!(error = ?err, "Upload notification handling failed");
            self.bus
                .publish(&IngestEvent::SqsError {
                    reason: "Failed to handle upload notification".to_string(),
                    error: format!("{err:#}"),
                })
                .await
                .context("publishing sqs_error event")?;
        }
        Ok(())
    }

    async fn process(&self, body: &str) -> Result<()> {
        let record = UploadNotification::parse(body)?;
        tracing::info!(bucket = %record.bucket, key = %record.key, "Upload notification received");

        let head = match self.storage.head(&record.key).await? {
            Some(head) => head,
            None => {
                let err = IngestError::FileNotFound {
                    key: record.key.clone(),
                };
                self.bus
                    .publish(&IngestEvent::FileNotFoundError {
                        reason: err.to_string(),
                        key: record.key.clone(),
                    })
                    .await
                    .context("publishing file_not_found_error event")?;
                return Ok(());
            }
        };

        let job = match self.lookup_job(&head).await? {
            JobLookup::Found(job) => job,
            JobLookup::NotFound {
                upload_id,
                tenant_id,
            } => {
                let err = IngestError::JobNotFound {
                    upload_id: upload_id.clone(),
                    tenant_id: tenant_id.clone(),
                };
                self.bus
                    .publish(&IngestEvent::IngestJobNotFoundError {
                        reason: err.to_string(),
                        upload_id,
                        tenant_id,
                    })
                    .await
                    .context("publishing ingest_job_not_found_error event")?;
                return Ok(());
            }
        };

        // A job past `initiated` already consumed its upload; this
        // notification is a replay or a re-PUT of the same presigned
        // URL. Remove the redundant object and resolve silently.
        if job.status != IngestJobStatus::Initiated {
            tracing::warn!(
                job_id = %job.id,
                status = job.status.as_str(),
                key = %record.key,
                "Ignoring upload for non-initiated job, deleting object"
            );
            self.storage
                .delete_version(&record.key, record.version_id.as_deref())
                .await?;
            return Ok(());
        }

        let bytes = self.storage.get_bytes(&record.key).await?;

        if !self.declared_type_matches(&job, &record, &bytes) {
            self.jobs.mark_failed(job.id).await?;
            let err = IngestError::FileTypeMismatch(job.file_type.as_str().to_string());
            self.bus
                .publish(&IngestEvent::FileTypeError {
                    reason: err.to_string(),
                    upload_id: job.upload_id.to_string(),
                    tenant_id: job.tenant_id.to_string(),
                })
                .await
                .context("publishing file_type_error event")?;
            return Ok(());
        }

        let job = self
            .jobs
            .mark_uploaded(job.id, &record.key, head.size_bytes)
            .await?;

        let digest = sha256_hex(&bytes);
        self.jobs.record_content_sha256(job.id, &digest).await?;

        if let Some(existing) = self
            .jobs
            .find_other_by_content_sha256(&digest, job.id)
            .await?
        {
            tracing::warn!(
                job_id = %job.id,
                existing_job_id = %existing.id,
                content_sha256 = %digest,
                "Duplicate upload detected"
            );
            self.jobs.mark_duplicate(job.id).await?;
            self.bus
                .publish(&IngestEvent::DuplicateUploadError {
                    reason: "Duplicate file upload by SHA256".to_string(),
                    content_sha256: digest,
                    new_file_key: record.key.clone(),
                    existing_file_key: existing.file_path.clone(),
                })
                .await
                .context("publishing duplicate_upload_error event")?;
            return Ok(());
        }

        self.bus
            .publish(&IngestEvent::NewFileUploadSuccess {
                job_id: job.id,
                upload_id: job.upload_id,
                tenant_id: job.tenant_id,
            })
            .await
            .context("publishing new_file_upload_success event")?;
        self.jobs.mark_queued(job.id).await?;

        tracing::info!(job_id = %job.id, key = %record.key, "Upload accepted and queued");
        Ok(())
    }

    async fn lookup_job(&self, head: &ObjectHead) -> Result<JobLookup> {
        let upload_raw = metadata_value(head, METADATA_UPLOAD_ID);
        let tenant_raw = metadata_value(head, METADATA_TENANT_ID);

        let ids = match (Uuid::parse_str(&upload_raw), Uuid::parse_str(&tenant_raw)) {
            (Ok(upload_id), Ok(tenant_id)) => Some((upload_id, tenant_id)),
            _ => None,
        };

        if let Some((upload_id, tenant_id)) = ids {
            if let Some(job) = self.jobs.find_by_upload(upload_id, tenant_id).await? {
                return Ok(JobLookup::Found(job));
            }
        }

        Ok(JobLookup::NotFound {
            upload_id: upload_raw,
            tenant_id: tenant_raw,
        })
    }

    fn declared_type_matches(&self, job: &IngestJob, record: &ObjectRecord, bytes: &[u8]) -> bool {
        let file_name = job
            .file_name
            .as_deref()
            .unwrap_or_else(|| record.key.rsplit('/').next().unwrap_or(&record.key));

        match detect_file_type(bytes, file_name) {
            Some(detected) => detected.file_type == job.file_type,
            None => false,
        }
    }
}

enum JobLookup {
    Found(IngestJob),
    NotFound { upload_id: String, tenant_id: String },
}

fn metadata_value(head: &ObjectHead, key: &str) -> String {
    head.metadata
        .get(key)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string())
}
