use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use siphon_bus::{Channel, EventBus};
use siphon_core::constants::RECEIVE_ERROR_BACKOFF;
use siphon_core::{FileType, IngestError, IngestEvent, IngestJob, IngestJobStatus};
use siphon_db::{DataSchemaStore, IngestJobStore, ProcessedDataStore};
use siphon_storage::ObjectStorage;

use crate::pipeline::{IngestPipeline, PipelineReport};
use crate::schema::CompiledSchema;
use crate::source::{CsvSource, JsonArraySource, NdjsonSource, RecordSource};

/// Pause between polls when a receive comes back empty.
const IDLE_PAUSE: std::time::Duration = std::time::Duration::from_millis(100);

/// Consumes upload-success events and runs each file through the
/// ingest pipeline.
///
/// Messages are acknowledged after handling either way: a processing
/// failure lands the job in `failed`, which is this stage's terminal
/// answer, not a reason to redeliver. Only transport errors leave the
/// message on the queue.
pub struct FileProcessingDispatcher {
    jobs: Arc<dyn IngestJobStore>,
    schemas: Arc<dyn DataSchemaStore>,
    processed: Arc<dyn ProcessedDataStore>,
    storage: Arc<dyn ObjectStorage>,
    bus: EventBus,
}

impl FileProcessingDispatcher {
    pub fn new(
        jobs: Arc<dyn IngestJobStore>,
        schemas: Arc<dyn DataSchemaStore>,
        processed: Arc<dyn ProcessedDataStore>,
        storage: Arc<dyn ObjectStorage>,
        bus: EventBus,
    ) -> Self {
        FileProcessingDispatcher {
            jobs,
            schemas,
            processed,
            storage,
            bus,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("File processing dispatcher started");
        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.bus.receive(Channel::Success) => result,
            };

            match batch {
                Ok(messages) => {
                    if messages.is_empty() {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(IDLE_PAUSE) => {}
                        }
                        continue;
                    }
                    for message in messages {
                        match self.handle_message(&message.body).await {
                            Ok(()) => {
                                if let Err(e) =
                                    self.bus.acknowledge(Channel::Success, &message.receipt).await
                                {
                                    tracing::error!(error = %e, "Failed to acknowledge event");
                                }
                            }
                            Err(e) => {
                                tracing::error!(error = ?e, "Event handling failed");
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Event receive failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::info!("File processing dispatcher stopped");
    }

    /// Handle one raw event body off the success channel.
    pub async fn handle_message(&self, body: &str) -> Result<()> {
        let event: IngestEvent = match serde_json::from_str(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable event");
                return Ok(());
            }
        };
        match event {
            IngestEvent::NewFileUploadSuccess { job_id, .. } => self.handle_success(job_id).await,
            other => {
                tracing::warn!(event = other.name(), "Unexpected event on success channel");
                Ok(())
            }
        }
    }

    async fn handle_success(&self, job_id: Uuid) -> Result<()> {
        let Some(job) = self.jobs.find(job_id).await? else {
            tracing::warn!(job_id = %job_id, "Event references unknown ingest job");
            return Ok(());
        };
        // Redelivered events for a job already past `queued` are absorbed
        // here.
        if job.status != IngestJobStatus::Queued {
            tracing::info!(
                job_id = %job.id,
                status = job.status.as_str(),
                "Skipping event for non-queued job"
            );
            return Ok(());
        }

        let job = self.jobs.mark_processing(job.id).await?;
        let started = Instant::now();
        match self.process_job(&job).await {
            Ok(report) => {
                self.jobs.mark_complete(job.id).await?;
                tracing::info!(
                    job_id = %job.id,
                    total = report.total_records,
                    valid = report.valid_records,
                    invalid = report.invalid_records,
                    rows_written = report.rows_written,
                    batches = report.batches,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingest job complete"
                );
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    error = ?e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingest job failed"
                );
                self.jobs.mark_failed(job.id).await?;
            }
        }
        Ok(())
    }

    async fn process_job(&self, job: &IngestJob) -> Result<PipelineReport> {
        let file_path = job.file_path.as_deref().ok_or(IngestError::MissingJobField {
            job_id: job.id,
            field: "file_path",
        })?;

        // Every job validates against its tenant schema; a job that
        // reached `queued` without one is malformed and fails here.
        let schema_id = job.schema_id.ok_or(IngestError::MissingJobField {
            job_id: job.id,
            field: "schema_id",
        })?;
        let schema = self
            .schemas
            .find(schema_id)
            .await?
            .ok_or(IngestError::SchemaNotFound(schema_id))?;
        let compiled = CompiledSchema::compile(&schema)?;

        let stream = self.storage.get_stream(file_path).await?;
        let mut source: Box<dyn RecordSource> = match job.file_type {
            FileType::Csv => Box::new(CsvSource::new(stream, schema.delimiter_byte()).await?),
            FileType::Json => Box::new(JsonArraySource::new(stream)),
            FileType::Ndjson => Box::new(NdjsonSource::new(stream)),
        };

        IngestPipeline::new(job, &compiled)
            .run(source.as_mut(), self.processed.as_ref())
            .await
    }
}

/// Drain the error channel, logging each event for operators.
///
/// No corrective action is taken; the job rows already carry the
/// terminal status.
pub async fn run_error_logger(bus: EventBus, shutdown: CancellationToken) {
    tracing::info!("Error event logger started");
    loop {
        let batch = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = bus.receive(Channel::Error) => result,
        };

        match batch {
            Ok(messages) => {
                if messages.is_empty() {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_PAUSE) => {}
                    }
                    continue;
                }
                for message in messages {
                    match serde_json::from_str::<IngestEvent>(&message.body) {
                        Ok(event) => {
                            tracing::warn!(event = event.name(), body = %message.body, "Pipeline error event");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, body = %message.body, "Undecodable error event");
                        }
                    }
                    if let Err(e) = bus.acknowledge(Channel::Error, &message.receipt).await {
                        tracing::error!(error = %e, "Failed to acknowledge error event");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error channel receive failed, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    tracing::info!("Error event logger stopped");
}
