//! In-process store implementations.
//!
//! These mirror the Postgres semantics — including the upsert's
//! conflict-target identity and compare-and-skip — closely enough that
//! pipeline scenario tests run without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use siphon_core::{DataSchema, IngestJob, IngestJobStatus, ProcessedData};

use crate::batch::dedupe_on_conflict_target;
use crate::traits::{DataSchemaStore, IngestJobStore, ProcessedDataStore};

/// In-memory ingest job store.
#[derive(Default)]
pub struct MemoryIngestJobStore {
    jobs: Mutex<HashMap<Uuid, IngestJob>>,
}

impl MemoryIngestJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: IngestJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<IngestJob> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<IngestJob>
    where
        F: FnOnce(&mut IngestJob),
    {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("ingest job {id} not found"))?;
        apply(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[async_trait]
impl IngestJobStore for MemoryIngestJobStore {
    async fn find(&self, id: Uuid) -> Result<Option<IngestJob>> {
        Ok(self.get(id))
    }

    async fn find_by_upload(&self, upload_id: Uuid, tenant_id: Uuid) -> Result<Option<IngestJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|j| j.upload_id == upload_id && j.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_other_by_content_sha256(
        &self,
        content_sha256: &str,
        excluding_job: Uuid,
    ) -> Result<Option<IngestJob>> {
        let jobs = self.jobs.lock().unwrap();
        let mut candidates: Vec<&IngestJob> = jobs
            .values()
            .filter(|j| j.id != excluding_job && j.content_sha256.as_deref() == Some(content_sha256))
            .collect();
        candidates.sort_by_key(|j| j.created_at);
        Ok(candidates.first().map(|j| (*j).clone()))
    }

    async fn record_content_sha256(&self, id: Uuid, content_sha256: &str) -> Result<()> {
        self.update(id, |job| {
            job.content_sha256 = Some(content_sha256.to_string());
        })?;
        Ok(())
    }

    async fn mark_uploaded(
        &self,
        id: Uuid,
        file_path: &str,
        size_bytes: i64,
    ) -> Result<IngestJob> {
        self.update(id, |job| {
            job.status = IngestJobStatus::Uploaded;
            job.file_path = Some(file_path.to_string());
            job.size_bytes = Some(size_bytes);
        })
    }

    async fn mark_queued(&self, id: Uuid) -> Result<IngestJob> {
        self.update(id, |job| job.status = IngestJobStatus::Queued)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<IngestJob> {
        self.update(id, |job| job.status = IngestJobStatus::Processing)
    }

    async fn mark_complete(&self, id: Uuid) -> Result<IngestJob> {
        self.update(id, |job| job.status = IngestJobStatus::Complete)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<IngestJob> {
        self.update(id, |job| job.status = IngestJobStatus::Failed)
    }

    async fn mark_duplicate(&self, id: Uuid) -> Result<IngestJob> {
        self.update(id, |job| job.status = IngestJobStatus::Duplicate)
    }
}

/// In-memory schema store.
#[derive(Default)]
pub struct MemoryDataSchemaStore {
    schemas: Mutex<HashMap<Uuid, DataSchema>>,
}

impl MemoryDataSchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schema: DataSchema) {
        self.schemas.lock().unwrap().insert(schema.id, schema);
    }
}

#[async_trait]
impl DataSchemaStore for MemoryDataSchemaStore {
    async fn find(&self, schema_id: Uuid) -> Result<Option<DataSchema>> {
        Ok(self.schemas.lock().unwrap().get(&schema_id).cloned())
    }
}

/// In-memory processed-data store with the Postgres upsert semantics.
#[derive(Default)]
pub struct MemoryProcessedDataStore {
    rows: Mutex<HashMap<(Uuid, String, String), ProcessedData>>,
    fail_next: Mutex<bool>,
}

impl MemoryProcessedDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored rows in unique-key order.
    pub fn rows(&self) -> Vec<ProcessedData> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<ProcessedData> = rows.values().cloned().collect();
        out.sort_by(|a, b| a.unique_key_value.cmp(&b.unique_key_value));
        out
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Make the next upsert fail, to exercise the caller's abort path.
    pub fn fail_next_upsert(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl ProcessedDataStore for MemoryProcessedDataStore {
    async fn upsert_batch(&self, batch: &[ProcessedData]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            anyhow::bail!("injected upsert failure");
        }

        let mut rows = self.rows.lock().unwrap();
        let mut written = 0;
        for record in dedupe_on_conflict_target(batch) {
            let key = (
                record.tenant_id,
                record.data_name.clone(),
                record.unique_key_value.clone(),
            );
            match rows.get(&key) {
                Some(existing)
                    if existing.content_hash == record.content_hash
                        && existing.schema_id == record.schema_id
                        && existing.ingest_job_id == record.ingest_job_id =>
                {
                    // Compare-and-skip: nothing would change.
                }
                _ => {
                    rows.insert(key, (*record).clone());
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}
