//! Pipeline-wide constants.
//!
//! These are design constants, not tuning knobs: the batch size bounds
//! memory to one batch of records per in-flight job, and the publish retry
//! matches the bus contract (one retry after a fixed delay).

use std::time::Duration;

/// Number of validated records accumulated before a batch is flushed to
/// the processed-data store. Flush boundaries affect write efficiency
/// only, never the stored content.
pub const BATCH_SIZE: usize = 1000;

/// Delay before the single publish retry on event-bus transport failure.
pub const PUBLISH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Backoff after a failed queue receive before polling again.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Long-poll wait for queue receives.
pub const RECEIVE_WAIT_SECONDS: i32 = 10;

/// Maximum messages fetched per queue receive.
pub const RECEIVE_MAX_MESSAGES: i32 = 5;

/// Bytes of object content inspected when sniffing the actual file type.
pub const SNIFF_PREFIX_BYTES: usize = 1000;

/// Placeholder stored when a record has no value at the schema's unique
/// key field, or a job has no data name.
pub const UNKNOWN_SENTINEL: &str = "unknown";
