use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use siphon_core::constants::RECEIVE_MAX_MESSAGES;

use crate::traits::{BusError, BusResult, MessageQueue, ReceivedMessage};

/// In-process queue used by tests and local development.
///
/// Receive moves messages into an in-flight map keyed by receipt;
/// `requeue_unacked` puts them back, which is how tests exercise
/// redelivery. `fail_next_send` injects transport failures to exercise
/// the publish retry.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
    fail_sends: AtomicUsize,
    next_receipt: AtomicUsize,
}

#[derive(Default)]
struct State {
    ready: VecDeque<String>,
    in_flight: HashMap<String, String>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send` fail; stacks when called repeatedly.
    pub fn fail_next_send(&self) {
        self.fail_sends.fetch_add(1, Ordering::SeqCst);
    }

    /// Messages waiting for delivery.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return all unacknowledged in-flight messages to the queue.
    pub fn requeue_unacked(&self) {
        let mut state = self.state.lock().unwrap();
        let receipts: Vec<String> = state.in_flight.keys().cloned().collect();
        for receipt in receipts {
            if let Some(body) = state.in_flight.remove(&receipt) {
                state.ready.push_back(body);
            }
        }
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, body: String) -> BusResult<()> {
        if self
            .fail_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BusError::Publish("injected transport failure".to_string()));
        }
        self.state.lock().unwrap().ready.push_back(body);
        Ok(())
    }

    async fn receive(&self) -> BusResult<Vec<ReceivedMessage>> {
        let mut state = self.state.lock().unwrap();
        let mut messages = Vec::new();
        while messages.len() < RECEIVE_MAX_MESSAGES as usize {
            let Some(body) = state.ready.pop_front() else {
                break;
            };
            let receipt = format!("receipt-{}", self.next_receipt.fetch_add(1, Ordering::SeqCst));
            state.in_flight.insert(receipt.clone(), body.clone());
            messages.push(ReceivedMessage { body, receipt });
        }
        Ok(messages)
    }

    async fn acknowledge(&self, receipt: &str) -> BusResult<()> {
        self.state.lock().unwrap().in_flight.remove(receipt);
        Ok(())
    }
}
