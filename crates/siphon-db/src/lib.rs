//! Persistence layer for the ingestion pipeline.
//!
//! Store traits are the seam between pipeline logic and Postgres; the
//! `pg` module holds the production implementations, `memory` an
//! in-process mirror with the same upsert semantics for tests and local
//! development.

pub mod batch;
pub mod memory;
pub mod pg;
mod traits;

pub use pg::{PgDataSchemaStore, PgIngestJobStore, PgProcessedDataStore};
pub use traits::{DataSchemaStore, IngestJobStore, ProcessedDataStore};

/// Embedded sqlx migrations; binaries run these at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
