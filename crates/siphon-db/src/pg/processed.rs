use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use siphon_core::ProcessedData;

use crate::batch::dedupe_on_conflict_target;
use crate::traits::ProcessedDataStore;

#[derive(Clone)]
pub struct PgProcessedDataStore {
    pool: PgPool,
}

impl PgProcessedDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedDataStore for PgProcessedDataStore {
    #[tracing::instrument(skip_all, fields(batch_len = batch.len()))]
    async fn upsert_batch(&self, batch: &[ProcessedData]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let records = dedupe_on_conflict_target(batch);

        let mut tenant_ids: Vec<Uuid> = Vec::with_capacity(records.len());
        let mut data_names: Vec<&str> = Vec::with_capacity(records.len());
        let mut schema_ids: Vec<Option<Uuid>> = Vec::with_capacity(records.len());
        let mut content_hashes: Vec<&str> = Vec::with_capacity(records.len());
        let mut unique_keys: Vec<&str> = Vec::with_capacity(records.len());
        let mut payloads: Vec<serde_json::Value> = Vec::with_capacity(records.len());
        let mut job_ids: Vec<Uuid> = Vec::with_capacity(records.len());
        for record in &records {
            tenant_ids.push(record.tenant_id);
            data_names.push(record.data_name.as_str());
            schema_ids.push(record.schema_id);
            content_hashes.push(record.content_hash.as_str());
            unique_keys.push(record.unique_key_value.as_str());
            payloads.push(record.data.clone());
            job_ids.push(record.ingest_job_id);
        }

        // One set-based statement: insert new identities, overwrite
        // changed ones, and skip rows whose stored content would not
        // change (no version column, compare-and-skip only).
        let result = sqlx::query(
            r#"
            INSERT INTO processed_data
                (tenant_id, data_name, schema_id, content_hash, unique_key_value, data, ingest_job_id)
            SELECT * FROM UNNEST(
                $1::uuid[], $2::text[], $3::uuid[], $4::text[], $5::text[], $6::jsonb[], $7::uuid[]
            )
            ON CONFLICT (tenant_id, data_name, unique_key_value)
            DO UPDATE SET
                schema_id = EXCLUDED.schema_id,
                data = EXCLUDED.data,
                content_hash = EXCLUDED.content_hash,
                ingest_job_id = EXCLUDED.ingest_job_id,
                updated_at = now()
            WHERE (processed_data.content_hash, processed_data.schema_id, processed_data.ingest_job_id)
                IS DISTINCT FROM (EXCLUDED.content_hash, EXCLUDED.schema_id, EXCLUDED.ingest_job_id)
            "#,
        )
        .bind(&tenant_ids)
        .bind(&data_names)
        .bind(&schema_ids)
        .bind(&content_hashes)
        .bind(&unique_keys)
        .bind(&payloads)
        .bind(&job_ids)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, batch_len = records.len(), "Processed data upsert failed");
            e
        })
        .context("upserting processed data batch")?;

        Ok(result.rows_affected())
    }
}
