use crate::domain::jobs::Task;
use crate::ports::queue::{Delivery, QueueClient, QueueError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    ready: VecDeque<Bytes>,
    unacked: Vec<Bytes>,
    acked: Vec<Bytes>,
    rejected: Vec<Bytes>,
    closed: bool,
}

/// Single-process queue with the same ready/unacked/rejected bookkeeping as the Redis one.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<State>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish_task(&self, task: &Task) {
        let payload = task.to_payload().expect("task serializes");
        self.publish(Bytes::from(payload)).await.expect("memory publish");
    }

    /// Once the ready deliveries are drained, `receive` reports `Closed`.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    pub fn unacked(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().unacked.clone()
    }

    pub fn acked(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn rejected(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().rejected.clone()
    }
}

pub struct MemoryDelivery {
    payload: Bytes,
    state: Arc<Mutex<State>>,
}

impl MemoryDelivery {
    fn settle(&self, rejected: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.unacked.iter().position(|p| *p == self.payload) {
            state.unacked.remove(pos);
        }
        if rejected {
            state.rejected.push(self.payload.clone());
        } else {
            state.acked.push(self.payload.clone());
        }
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> Result<(), QueueError> {
        self.settle(false);
        Ok(())
    }

    async fn reject(&self) -> Result<(), QueueError> {
        self.settle(true);
        Ok(())
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    type Delivery = MemoryDelivery;

    async fn publish(&self, payload: Bytes) -> Result<(), QueueError> {
        self.state.lock().unwrap().ready.push_back(payload);
        Ok(())
    }

    async fn receive(&self, poll_interval: Duration) -> Result<Option<MemoryDelivery>, QueueError> {
        let next = {
            let mut state = self.state.lock().unwrap();
            if state.closed && state.ready.is_empty() {
                return Err(QueueError::Closed);
            }
            let next = state.ready.pop_front();
            if let Some(payload) = &next {
                state.unacked.push(payload.clone());
            }
            next
        };
        match next {
            Some(payload) => Ok(Some(MemoryDelivery {
                payload,
                state: self.state.clone(),
            })),
            None => {
                tokio::time::sleep(poll_interval).await;
                Ok(None)
            }
        }
    }
}
