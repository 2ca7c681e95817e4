use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use siphon_bus::MessageQueue;
use siphon_core::constants::RECEIVE_ERROR_BACKOFF;

use crate::handler::UploadCompletionHandler;

/// Pause between polls when a receive comes back empty.
const IDLE_PAUSE: std::time::Duration = std::time::Duration::from_millis(100);

/// Long-polls the notification queue and feeds messages to the handler.
///
/// Messages are acknowledged only after the handler resolves them, so a
/// crash mid-handle redelivers. Receive failures back off briefly and
/// the loop keeps polling.
pub struct NotificationPoller {
    queue: Arc<dyn MessageQueue>,
    handler: Arc<UploadCompletionHandler>,
}

impl NotificationPoller {
    pub fn new(queue: Arc<dyn MessageQueue>, handler: Arc<UploadCompletionHandler>) -> Self {
        NotificationPoller { queue, handler }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Upload notification poller started");
        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.queue.receive() => result,
            };

            match batch {
                Ok(messages) => {
                    if messages.is_empty() {
                        // Long-polling transports block in receive; this
                        // keeps non-blocking ones from spinning.
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(IDLE_PAUSE) => {}
                        }
                        continue;
                    }
                    for message in messages {
                        match self.handler.handle(&message.body).await {
                            Ok(()) => {
                                if let Err(e) = self.queue.acknowledge(&message.receipt).await {
                                    tracing::error!(error = %e, "Failed to acknowledge notification");
                                }
                            }
                            Err(e) => {
                                // Left on the queue for redelivery.
                                tracing::error!(error = ?e, "Notification handling failed");
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Notification receive failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::info!("Upload notification poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;
    use tempfile::TempDir;

    use siphon_bus::{EventBus, MemoryQueue};
    use siphon_db::memory::MemoryIngestJobStore;
    use siphon_storage::{LocalObjectStorage, ObjectStorage};

    #[tokio::test]
    async fn drains_queue_and_acknowledges() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalObjectStorage::new(dir.path()).await.unwrap());
        storage
            .put("raw/a.csv", Bytes::from("id\n1\n"), "text/csv", HashMap::new())
            .await
            .unwrap();

        let error = Arc::new(MemoryQueue::new());
        let bus = EventBus::new(Arc::new(MemoryQueue::new()), error.clone());
        let handler = Arc::new(UploadCompletionHandler::new(
            Arc::new(MemoryIngestJobStore::new()),
            storage,
            bus,
        ));

        let notifications = Arc::new(MemoryQueue::new());
        notifications
            .send(
                serde_json::json!({
                    "Records": [{"s3": {
                        "bucket": {"name": "raw-data"},
                        "object": {"key": "raw/a.csv"}
                    }}]
                })
                .to_string(),
            )
            .await
            .unwrap();

        let poller = NotificationPoller::new(notifications.clone(), handler);
        let shutdown = CancellationToken::new();
        let run = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { poller.run(shutdown).await })
        };

        // The upload has no metadata, so the handler resolves it as a
        // job-not-found error and the message is acknowledged.
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while error.len() == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        run.await.unwrap();
        assert_eq!(notifications.len(), 0);
    }
}
