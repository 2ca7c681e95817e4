mod event;
mod file_type;
mod job;
mod notification;
mod processed;
mod schema;
mod tenant;

pub use event::IngestEvent;
pub use file_type::FileType;
pub use job::{IngestJob, IngestJobStatus};
pub use notification::{ObjectRecord, UploadNotification};
pub use processed::ProcessedData;
pub use schema::DataSchema;
pub use tenant::Tenant;
