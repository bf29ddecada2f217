use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("queue closed")]
    Closed,
}

/// One message instance handed out by the broker.
///
/// A delivery that is neither acked nor rejected stays owned by the broker and
/// is handed out again after the consumer goes away.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    async fn ack(&self) -> Result<(), QueueError>;

    async fn reject(&self) -> Result<(), QueueError>;
}

/// At-least-once message queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    type Delivery: Delivery + 'static;

    async fn publish(&self, payload: Bytes) -> Result<(), QueueError>;

    /// Waits up to `poll_interval` for the next delivery.
    async fn receive(&self, poll_interval: Duration)
        -> Result<Option<Self::Delivery>, QueueError>;
}

/// Endless stream of deliveries, polling every `poll_interval`.
///
/// Empty polls are skipped; broker errors are yielded so the caller decides
/// whether to back off. The stream only ends if the broker reports `Closed`.
pub fn deliveries<Q>(
    queue: &Q,
    poll_interval: Duration,
) -> impl Stream<Item = Result<Q::Delivery, QueueError>> + '_
where
    Q: QueueClient,
{
    stream::unfold((), move |()| async move {
        loop {
            match queue.receive(poll_interval).await {
                Ok(Some(delivery)) => return Some((Ok(delivery), ())),
                Ok(None) => continue,
                Err(QueueError::Closed) => return None,
                Err(e) => return Some((Err(e), ())),
            }
        }
    })
}
