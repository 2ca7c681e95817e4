mod job;
mod processed;
mod schema;

pub use job::PgIngestJobStore;
pub use processed::PgProcessedDataStore;
pub use schema::PgDataSchemaStore;
