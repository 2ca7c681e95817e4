//! Siphon core library
//!
//! Domain models, event types, configuration and shared utilities for the
//! Siphon ingestion pipeline. Everything here is transport- and
//! storage-agnostic; the service crates wire these types to SQS, S3 and
//! Postgres.

pub mod config;
pub mod constants;
pub mod error;
pub mod filetype;
pub mod hash;
pub mod models;

pub use config::{ParserConfig, SharedConfig, UploaderConfig};
pub use error::IngestError;
pub use filetype::{detect_file_type, DetectedFileType};
pub use hash::{canonical_json, content_hash, sha256_hex};
pub use models::{
    DataSchema, FileType, IngestEvent, IngestJob, IngestJobStatus, ObjectRecord, ProcessedData,
    Tenant, UploadNotification,
};
