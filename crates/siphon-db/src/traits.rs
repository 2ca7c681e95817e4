use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use siphon_core::{DataSchema, IngestJob, ProcessedData};

/// Reads and status transitions on ingest jobs.
///
/// Each `mark_*` is a single UPDATE of the job row. There is no
/// optimistic locking: one upload id maps to one job and one
/// notification, so concurrent writers to the same job are not expected;
/// this is an accepted risk of the design, not an invariant the store
/// enforces.
#[async_trait]
pub trait IngestJobStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<IngestJob>>;

    async fn find_by_upload(&self, upload_id: Uuid, tenant_id: Uuid) -> Result<Option<IngestJob>>;

    /// Another job already holding this whole-file hash, if any.
    async fn find_other_by_content_sha256(
        &self,
        content_sha256: &str,
        excluding_job: Uuid,
    ) -> Result<Option<IngestJob>>;

    /// Record the whole-file hash once computed. Not a status transition.
    async fn record_content_sha256(&self, id: Uuid, content_sha256: &str) -> Result<()>;

    /// Transition to `uploaded`, recording the object key and size from
    /// the storage notification.
    async fn mark_uploaded(&self, id: Uuid, file_path: &str, size_bytes: i64)
        -> Result<IngestJob>;
    async fn mark_queued(&self, id: Uuid) -> Result<IngestJob>;
    async fn mark_processing(&self, id: Uuid) -> Result<IngestJob>;
    async fn mark_complete(&self, id: Uuid) -> Result<IngestJob>;
    async fn mark_failed(&self, id: Uuid) -> Result<IngestJob>;
    async fn mark_duplicate(&self, id: Uuid) -> Result<IngestJob>;
}

/// Lookup of tenant-defined schemas.
#[async_trait]
pub trait DataSchemaStore: Send + Sync {
    async fn find(&self, schema_id: Uuid) -> Result<Option<DataSchema>>;
}

/// Idempotent batched writes of accepted records.
#[async_trait]
pub trait ProcessedDataStore: Send + Sync {
    /// Upsert a batch keyed on `(tenant_id, data_name,
    /// unique_key_value)`. Returns the number of rows actually written;
    /// rows whose stored content would not change are skipped. Empty
    /// batches are a no-op. Failure is propagated, not retried — retry
    /// policy belongs to the caller.
    async fn upsert_batch(&self, batch: &[ProcessedData]) -> Result<u64>;
}
