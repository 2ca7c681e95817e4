use std::sync::Arc;

use siphon_core::constants::PUBLISH_RETRY_DELAY;
use siphon_core::IngestEvent;

use crate::traits::{BusResult, MessageQueue, ReceivedMessage};

/// Logical channels of the ingestion bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Success,
    Error,
}

/// The two-channel event bus connecting the upload stage to the
/// processing stage.
///
/// Publish is at-least-once: on transport failure it waits a fixed 2s
/// and retries exactly once before propagating the failure. The delay is
/// a design constant, not a policy knob.
#[derive(Clone)]
pub struct EventBus {
    success: Arc<dyn MessageQueue>,
    error: Arc<dyn MessageQueue>,
}

impl EventBus {
    pub fn new(success: Arc<dyn MessageQueue>, error: Arc<dyn MessageQueue>) -> Self {
        EventBus { success, error }
    }

    fn queue(&self, channel: Channel) -> &dyn MessageQueue {
        match channel {
            Channel::Success => self.success.as_ref(),
            Channel::Error => self.error.as_ref(),
        }
    }

    /// Publish an event on the channel implied by its kind.
    pub async fn publish(&self, event: &IngestEvent) -> BusResult<()> {
        let channel = if event.is_success() {
            Channel::Success
        } else {
            Channel::Error
        };
        let body = serde_json::to_string(event)?;

        match self.queue(channel).send(body.clone()).await {
            Ok(()) => {
                tracing::debug!(event = event.name(), channel = ?channel, "Event published");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Publish failed, retrying...");
                tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                self.queue(channel).send(body).await
            }
        }
    }

    pub async fn receive(&self, channel: Channel) -> BusResult<Vec<ReceivedMessage>> {
        self.queue(channel).receive().await
    }

    pub async fn acknowledge(&self, channel: Channel, receipt: &str) -> BusResult<()> {
        self.queue(channel).acknowledge(receipt).await
    }
}
