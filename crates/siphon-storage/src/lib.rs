//! Object storage backends for the ingestion pipeline.
//!
//! The pipeline reads uploaded files as byte streams, inspects object
//! metadata (upload and tenant ids travel as user metadata), and deletes
//! redundant replay uploads. S3 is the production backend; the local
//! backend backs tests and single-node development.

mod local;
mod s3;
mod traits;

pub use local::LocalObjectStorage;
pub use s3::S3ObjectStorage;
pub use traits::{ObjectHead, ObjectStorage, StorageError, StorageResult};
