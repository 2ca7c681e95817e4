use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;

/// A message pulled from a queue, pending acknowledgement.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    /// Opaque receipt handle; pass back to `acknowledge` once the
    /// message has been handled.
    pub receipt: String,
}

/// An at-least-once message queue shared by a consumer group.
///
/// A message stays on the queue (and may be redelivered) until
/// `acknowledge` is called with its receipt. Consumers acknowledge only
/// after handling, so a crash mid-handle redelivers rather than loses.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, body: String) -> BusResult<()>;

    /// Long-poll for a batch of messages; may return empty.
    async fn receive(&self) -> BusResult<Vec<ReceivedMessage>>;

    async fn acknowledge(&self, receipt: &str) -> BusResult<()>;
}
