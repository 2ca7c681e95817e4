use anyhow::Result;

use siphon_core::constants::BATCH_SIZE;
use siphon_core::{IngestJob, ProcessedData};
use siphon_db::ProcessedDataStore;

use crate::schema::CompiledSchema;
use crate::source::RecordSource;

/// Outcome of one file run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub total_records: u64,
    pub valid_records: u64,
    pub invalid_records: u64,
    pub rows_written: u64,
    pub batches: u64,
}

/// Drives records from a source through validation into batched upserts.
///
/// Records that fail validation are logged and skipped; the rest
/// accumulate into batches of [`BATCH_SIZE`] and each full (or final
/// partial) batch goes to the store. A file with no valid records issues
/// no writes at all. A store failure aborts the run; batches already
/// upserted stay, which is safe because the upsert is idempotent.
pub struct IngestPipeline<'a> {
    job: &'a IngestJob,
    schema: &'a CompiledSchema,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(job: &'a IngestJob, schema: &'a CompiledSchema) -> Self {
        IngestPipeline { job, schema }
    }

    pub async fn run(
        &self,
        source: &mut dyn RecordSource,
        store: &dyn ProcessedDataStore,
    ) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let mut batch: Vec<ProcessedData> = Vec::with_capacity(BATCH_SIZE);
        let unique_field = self.schema.unique_field();

        while let Some(mut record) = source.next_record().await? {
            report.total_records += 1;

            if let Err(reason) = self.schema.check(&mut record) {
                report.invalid_records += 1;
                tracing::warn!(
                    job_id = %self.job.id,
                    record = report.total_records,
                    reason = %reason,
                    "Skipping invalid record"
                );
                continue;
            }

            report.valid_records += 1;
            batch.push(ProcessedData::from_record(record, self.job, unique_field));

            if batch.len() == BATCH_SIZE {
                self.flush(store, &mut batch, &mut report).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(store, &mut batch, &mut report).await?;
        }
        Ok(report)
    }

    async fn flush(
        &self,
        store: &dyn ProcessedDataStore,
        batch: &mut Vec<ProcessedData>,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let started = std::time::Instant::now();
        let written = store.upsert_batch(batch).await?;
        report.rows_written += written;
        report.batches += 1;
        tracing::debug!(
            job_id = %self.job.id,
            batch_len = batch.len(),
            rows_written = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch upserted"
        );
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use uuid::Uuid;

    use siphon_core::{DataSchema, FileType, IngestJobStatus};
    use siphon_db::memory::MemoryProcessedDataStore;

    struct VecSource(Vec<Value>);

    #[async_trait]
    impl RecordSource for VecSource {
        async fn next_record(&mut self) -> Result<Option<Value>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    /// Records the size of every batch it receives.
    #[derive(Default)]
    struct BatchSizeRecorder {
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ProcessedDataStore for BatchSizeRecorder {
        async fn upsert_batch(&self, batch: &[ProcessedData]) -> Result<u64> {
            self.sizes.lock().unwrap().push(batch.len());
            Ok(batch.len() as u64)
        }
    }

    fn job() -> IngestJob {
        IngestJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            upload_id: Uuid::new_v4(),
            file_name: Some("orders.csv".to_string()),
            file_type: FileType::Csv,
            data_name: Some("orders".to_string()),
            schema_id: None,
            file_path: Some("raw/orders.csv".to_string()),
            content_sha256: None,
            status: IngestJobStatus::Processing,
            size_bytes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn compiled(document: Value) -> CompiledSchema {
        let schema = DataSchema {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "orders".to_string(),
            description: None,
            document,
            file_type: FileType::Csv,
            delimiter: ",".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        CompiledSchema::compile(&schema).unwrap()
    }

    fn orders_schema() -> CompiledSchema {
        compiled(json!({
            "type": "object",
            "x-unique": "id",
            "properties": {
                "id": {"type": ["string", "integer"]},
                "name": {"type": "string"}
            },
            "required": ["id"]
        }))
    }

    fn open_schema() -> CompiledSchema {
        compiled(json!({"type": "object", "additionalProperties": true}))
    }

    #[tokio::test]
    async fn batches_fill_then_flush_remainder() {
        let records: Vec<Value> = (0..2500).map(|i| json!({"id": i})).collect();
        let store = BatchSizeRecorder::default();
        let schema = open_schema();
        let job = job();
        let pipeline = IngestPipeline::new(&job, &schema);

        let report = pipeline
            .run(&mut VecSource(records), &store)
            .await
            .unwrap();

        assert_eq!(*store.sizes.lock().unwrap(), vec![1000, 1000, 500]);
        assert_eq!(report.total_records, 2500);
        assert_eq!(report.valid_records, 2500);
        assert_eq!(report.batches, 3);
    }

    #[tokio::test]
    async fn invalid_records_are_skipped_not_fatal() {
        let schema = orders_schema();
        let job = job();
        let pipeline = IngestPipeline::new(&job, &schema);
        let store = MemoryProcessedDataStore::new();

        let report = pipeline
            .run(
                &mut VecSource(vec![
                    json!({"id": 1, "name": "a"}),
                    json!({"name": "missing id"}),
                    json!({"id": 2}),
                ]),
                &store,
            )
            .await
            .unwrap();

        assert_eq!(report.total_records, 3);
        assert_eq!(report.valid_records, 2);
        assert_eq!(report.invalid_records, 1);
        assert_eq!(store.row_count(), 2);
    }

    #[tokio::test]
    async fn unique_key_comes_from_schema_extension() {
        let schema = orders_schema();
        let job = job();
        let pipeline = IngestPipeline::new(&job, &schema);
        let store = MemoryProcessedDataStore::new();

        pipeline
            .run(
                &mut VecSource(vec![
                    json!({"id": 1, "name": "a"}),
                    json!({"id": 2, "name": "b"}),
                ]),
                &store,
            )
            .await
            .unwrap();

        let keys: Vec<String> = store
            .rows()
            .into_iter()
            .map(|r| r.unique_key_value)
            .collect();
        assert_eq!(keys, vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn no_valid_records_means_no_writes() {
        let schema = orders_schema();
        let job = job();
        let pipeline = IngestPipeline::new(&job, &schema);
        let store = BatchSizeRecorder::default();

        let report = pipeline
            .run(&mut VecSource(vec![json!({"name": "nope"})]), &store)
            .await
            .unwrap();

        assert!(store.sizes.lock().unwrap().is_empty());
        assert_eq!(report.batches, 0);
        assert_eq!(report.invalid_records, 1);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let schema = open_schema();
        let job = job();
        let pipeline = IngestPipeline::new(&job, &schema);
        let store = MemoryProcessedDataStore::new();
        store.fail_next_upsert();

        let result = pipeline
            .run(&mut VecSource(vec![json!({"id": 1})]), &store)
            .await;
        assert!(result.is_err());
    }
}
