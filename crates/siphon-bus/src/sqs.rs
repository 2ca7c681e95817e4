use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client;

use siphon_core::constants::{RECEIVE_MAX_MESSAGES, RECEIVE_WAIT_SECONDS};

use crate::traits::{BusError, BusResult, MessageQueue, ReceivedMessage};

/// Build an SQS client, optionally against a custom endpoint
/// (LocalStack, ElasticMQ).
pub async fn sqs_client(region: String, endpoint_url: Option<String>) -> Client {
    let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    Client::new(&loader.load().await)
}

/// One SQS queue as an at-least-once message queue.
///
/// Visibility timeout handles redelivery of unacknowledged messages;
/// `acknowledge` maps to message deletion.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        SqsQueue { client, queue_url }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: String) -> BusResult<()> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                tracing::error!(error = %service_error, queue = %self.queue_url, "SQS send failed");
                BusError::Publish(service_error.to_string())
            })?;
        Ok(())
    }

    async fn receive(&self) -> BusResult<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .wait_time_seconds(RECEIVE_WAIT_SECONDS)
            .max_number_of_messages(RECEIVE_MAX_MESSAGES)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                tracing::error!(error = %service_error, queue = %self.queue_url, "SQS receive failed");
                BusError::Receive(service_error.to_string())
            })?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| match (m.body, m.receipt_handle) {
                (Some(body), Some(receipt)) => Some(ReceivedMessage { body, receipt }),
                _ => {
                    tracing::warn!(queue = %self.queue_url, "Dropping SQS message without body or receipt");
                    None
                }
            })
            .collect();
        Ok(messages)
    }

    async fn acknowledge(&self, receipt: &str) -> BusResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                tracing::error!(error = %service_error, queue = %self.queue_url, "SQS delete failed");
                BusError::Acknowledge(service_error.to_string())
            })?;
        Ok(())
    }
}
