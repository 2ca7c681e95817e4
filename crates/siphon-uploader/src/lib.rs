//! Upload completion service.
//!
//! Consumes S3 "object created" notifications, validates each upload
//! against its ingest job, deduplicates by whole-file SHA-256, and hands
//! accepted files to the processing stage over the event bus.

mod handler;
mod poller;

pub use handler::UploadCompletionHandler;
pub use poller::NotificationPoller;
