use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FileType;

/// Lifecycle status of an ingest job.
///
/// Main path: `Initiated -> Uploaded -> Queued -> Processing ->
/// Complete | Failed`. Side branches: `Duplicate` (terminal, from
/// `Uploaded`, same content hash as an earlier job) and `Stale`
/// (terminal, presigned URL expired unused; detection lives outside the
/// pipeline). The status never re-enters `Initiated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ingest_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IngestJobStatus {
    Initiated,
    Uploaded,
    Queued,
    Processing,
    Complete,
    Failed,
    Stale,
    Duplicate,
}

impl IngestJobStatus {
    /// Whether a transition from `self` to `to` is legal.
    ///
    /// `Failed` is reachable from any non-terminal state: file-type
    /// mismatch fails the job before it is ever marked uploaded, and a
    /// pipeline failure fails it from `Processing`.
    pub fn can_transition(&self, to: IngestJobStatus) -> bool {
        use IngestJobStatus::*;
        match (self, to) {
            (Initiated, Uploaded) | (Initiated, Stale) | (Initiated, Failed) => true,
            (Uploaded, Queued) | (Uploaded, Duplicate) | (Uploaded, Failed) => true,
            (Queued, Processing) | (Queued, Failed) => true,
            (Processing, Complete) | (Processing, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestJobStatus::Complete
                | IngestJobStatus::Failed
                | IngestJobStatus::Stale
                | IngestJobStatus::Duplicate
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestJobStatus::Initiated => "initiated",
            IngestJobStatus::Uploaded => "uploaded",
            IngestJobStatus::Queued => "queued",
            IngestJobStatus::Processing => "processing",
            IngestJobStatus::Complete => "complete",
            IngestJobStatus::Failed => "failed",
            IngestJobStatus::Stale => "stale",
            IngestJobStatus::Duplicate => "duplicate",
        }
    }
}

/// The persistent record tracking one file's journey through the
/// pipeline. Created by the upload-initiation endpoint (outside this
/// system); mutated only by the upload-completion handler and the file
/// processing dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub upload_id: Uuid,
    pub file_name: Option<String>,
    pub file_type: FileType,
    pub data_name: Option<String>,
    pub schema_id: Option<Uuid>,
    /// Object-storage key of the uploaded file.
    pub file_path: Option<String>,
    /// SHA-256 over the full file content, hex-encoded. Null until the
    /// completion handler has read the object.
    pub content_sha256: Option<String>,
    pub status: IngestJobStatus,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::IngestJobStatus::*;

    #[test]
    fn main_path_is_monotonic() {
        assert!(Initiated.can_transition(Uploaded));
        assert!(Uploaded.can_transition(Queued));
        assert!(Queued.can_transition(Processing));
        assert!(Processing.can_transition(Complete));
        assert!(Processing.can_transition(Failed));
    }

    #[test]
    fn never_reenters_initiated() {
        for from in [Uploaded, Queued, Processing, Complete, Failed, Stale, Duplicate] {
            assert!(!from.can_transition(Initiated));
        }
    }

    #[test]
    fn side_branches_are_terminal() {
        assert!(Uploaded.can_transition(Duplicate));
        assert!(Initiated.can_transition(Stale));
        for terminal in [Complete, Failed, Stale, Duplicate] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition(Processing));
        }
    }
}
