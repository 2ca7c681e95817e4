//! Event transport between the upload and processing stages.
//!
//! Delivery is at-least-once end to end: publish retries once after a
//! fixed delay, consumption acknowledges only after the handler returns,
//! and downstream writes are idempotent so duplicate deliveries are
//! absorbed there, not here.

mod bus;
mod memory;
mod sqs;
mod traits;

pub use bus::{Channel, EventBus};
pub use memory::MemoryQueue;
pub use sqs::{sqs_client, SqsQueue};
pub use traits::{BusError, BusResult, MessageQueue, ReceivedMessage};
