use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages exchanged between the upload and processing stages.
///
/// Serialized as `{"event": "<name>", "payload": {...}}`.
/// `NewFileUploadSuccess` travels on the success channel; the rest on
/// the error channel. Error events are operator-facing: consumers log
/// them, no corrective action is taken automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum IngestEvent {
    NewFileUploadSuccess {
        job_id: Uuid,
        upload_id: Uuid,
        tenant_id: Uuid,
    },
    FileNotFoundError {
        reason: String,
        key: String,
    },
    FileTypeError {
        reason: String,
        upload_id: String,
        tenant_id: String,
    },
    DuplicateUploadError {
        reason: String,
        content_sha256: String,
        new_file_key: String,
        existing_file_key: Option<String>,
    },
    IngestJobNotFoundError {
        reason: String,
        upload_id: String,
        tenant_id: String,
    },
    SqsError {
        reason: String,
        error: String,
    },
}

impl IngestEvent {
    /// Wire name of the event, as used in the `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            IngestEvent::NewFileUploadSuccess { .. } => "new_file_upload_success",
            IngestEvent::FileNotFoundError { .. } => "file_not_found_error",
            IngestEvent::FileTypeError { .. } => "file_type_error",
            IngestEvent::DuplicateUploadError { .. } => "duplicate_upload_error",
            IngestEvent::IngestJobNotFoundError { .. } => "ingest_job_not_found_error",
            IngestEvent::SqsError { .. } => "sqs_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestEvent::NewFileUploadSuccess { .. })
    }
}
