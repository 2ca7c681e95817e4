//! File processing service.
//!
//! Consumes upload-success events, streams the uploaded file out of
//! object storage, validates each record against the job's schema, and
//! upserts accepted records into the processed-data store in batches.

mod dispatcher;
mod pipeline;
mod schema;
mod source;

pub use dispatcher::{run_error_logger, FileProcessingDispatcher};
pub use pipeline::{IngestPipeline, PipelineReport};
pub use schema::CompiledSchema;
pub use source::{CsvSource, JsonArraySource, NdjsonSource, RecordSource};
