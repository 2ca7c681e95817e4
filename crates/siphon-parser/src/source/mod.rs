//! Streaming record sources for the supported file formats.
//!
//! Each source yields one JSON value per input record without ever
//! holding the whole file in memory. Malformed individual records are
//! logged and skipped; structural errors (unreadable input, a document
//! that is not what the format promises) abort the job.

mod csv;
mod json_array;
mod ndjson;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use csv::CsvSource;
pub use json_array::JsonArraySource;
pub use ndjson::NdjsonSource;

#[async_trait]
pub trait RecordSource: Send {
    /// Next record, or `None` at end of input.
    async fn next_record(&mut self) -> Result<Option<Value>>;
}
