use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use siphon_core::{IngestJob, IngestJobStatus};

use crate::traits::IngestJobStore;

const JOB_COLUMNS: &str = "id, tenant_id, upload_id, file_name, file_type, data_name, schema_id, \
     file_path, content_sha256, status, size_bytes, created_at, updated_at";

#[derive(Clone)]
pub struct PgIngestJobStore {
    pool: PgPool,
}

impl PgIngestJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(&self, id: Uuid, status: IngestJobStatus) -> Result<IngestJob> {
        let job = sqlx::query_as::<_, IngestJob>(&format!(
            r#"
            UPDATE ingest_job
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, job_id = %id, status = status.as_str(), "Failed to update ingest job status");
            e
        })
        .with_context(|| format!("updating ingest job {id} to {}", status.as_str()))?;

        tracing::info!(job_id = %id, status = status.as_str(), "Ingest job status updated");
        Ok(job)
    }
}

#[async_trait]
impl IngestJobStore for PgIngestJobStore {
    async fn find(&self, id: Uuid) -> Result<Option<IngestJob>> {
        let job = sqlx::query_as::<_, IngestJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingest_job WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching ingest job by id")?;
        Ok(job)
    }

    async fn find_by_upload(&self, upload_id: Uuid, tenant_id: Uuid) -> Result<Option<IngestJob>> {
        let job = sqlx::query_as::<_, IngestJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingest_job WHERE upload_id = $1 AND tenant_id = $2"
        ))
        .bind(upload_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching ingest job by upload")?;
        Ok(job)
    }

    async fn find_other_by_content_sha256(
        &self,
        content_sha256: &str,
        excluding_job: Uuid,
    ) -> Result<Option<IngestJob>> {
        let job = sqlx::query_as::<_, IngestJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM ingest_job
            WHERE content_sha256 = $1 AND id <> $2
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(content_sha256)
        .bind(excluding_job)
        .fetch_optional(&self.pool)
        .await
        .context("fetching ingest job by content hash")?;
        Ok(job)
    }

    async fn record_content_sha256(&self, id: Uuid, content_sha256: &str) -> Result<()> {
        sqlx::query("UPDATE ingest_job SET content_sha256 = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(content_sha256)
            .execute(&self.pool)
            .await
            .context("recording ingest job content hash")?;
        Ok(())
    }

    async fn mark_uploaded(
        &self,
        id: Uuid,
        file_path: &str,
        size_bytes: i64,
    ) -> Result<IngestJob> {
        let job = sqlx::query_as::<_, IngestJob>(&format!(
            r#"
            UPDATE ingest_job
            SET status = $2, file_path = $3, size_bytes = $4, updated_at = now()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(IngestJobStatus::Uploaded)
        .bind(file_path)
        .bind(size_bytes)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("marking ingest job {id} uploaded"))?;

        tracing::info!(job_id = %id, file_path, size_bytes, "Ingest job marked uploaded");
        Ok(job)
    }

    async fn mark_queued(&self, id: Uuid) -> Result<IngestJob> {
        self.set_status(id, IngestJobStatus::Queued).await
    }

    async fn mark_processing(&self, id: Uuid) -> Result<IngestJob> {
        self.set_status(id, IngestJobStatus::Processing).await
    }

    async fn mark_complete(&self, id: Uuid) -> Result<IngestJob> {
        self.set_status(id, IngestJobStatus::Complete).await
    }

    async fn mark_failed(&self, id: Uuid) -> Result<IngestJob> {
        self.set_status(id, IngestJobStatus::Failed).await
    }

    async fn mark_duplicate(&self, id: Uuid) -> Result<IngestJob> {
        self.set_status(id, IngestJobStatus::Duplicate).await
    }
}
