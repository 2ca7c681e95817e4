//! Error types shared across the pipeline crates.

use uuid::Uuid;

/// Errors raised by the ingestion pipeline.
///
/// Not-found and policy violations are terminal for the triggering
/// message and surface as error events; schema and parse failures are
/// terminal for their job; everything transport- or storage-shaped is
/// wrapped by the crates that own those backends.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Ingest job not found: [uploadId: {upload_id}, tenantId: {tenant_id}]")]
    JobNotFound { upload_id: String, tenant_id: String },

    #[error("File not found: {key}")]
    FileNotFound { key: String },

    #[error("Schema not found: {0}")]
    SchemaNotFound(Uuid),

    #[error("Schema compilation failed: {0}")]
    SchemaCompile(String),

    #[error("The file is invalid or does not match declared upload type: {0}")]
    FileTypeMismatch(String),

    #[error("Ingest job {job_id} is missing required field {field}")]
    MissingJobField { job_id: Uuid, field: &'static str },

    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
