//! Reliable list queue: a delivery is moved atomically from `ready` to the
//! receiving consumer's own `unacked` list and stays there until acked or
//! rejected.
//!
//! Each consumer keeps a heartbeat key alive while it runs. Unacked lists are
//! only reclaimed from consumers whose heartbeat has expired.

use super::KEY_PREFIX;
use crate::ports::queue::{Delivery, QueueClient, QueueError};
use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::Pool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shortest blocking wait sent to Redis; a zero timeout would block forever.
const MIN_BLOCK_SECS: f64 = 0.01;

/// A consumer whose heartbeat is older than this is considered dead.
pub const HEARTBEAT_TTL: Duration = Duration::from_secs(60);

/// How often a running consumer should call [`RedisQueue::heartbeat`].
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct QueueKeys {
    base: String,
    pub ready: String,
    pub rejected: String,
    pub consumers: String,
}

impl QueueKeys {
    pub fn new(name: &str) -> Self {
        let base = format!("{}:queue:{}", KEY_PREFIX, name);
        Self {
            ready: format!("{}:ready", base),
            rejected: format!("{}:rejected", base),
            consumers: format!("{}:consumers", base),
            base,
        }
    }

    pub fn unacked(&self, consumer: &str) -> String {
        format!("{}:unacked:{}", self.base, consumer)
    }

    pub fn heartbeat(&self, consumer: &str) -> String {
        format!("{}:heartbeat:{}", self.base, consumer)
    }
}

/// Consumers other than `me` whose heartbeat is gone.
fn stale_consumers<'a>(consumers: &'a [String], alive: &[bool], me: &str) -> Vec<&'a str> {
    consumers
        .iter()
        .zip(alive)
        .filter(|(consumer, alive)| !**alive && consumer.as_str() != me)
        .map(|(consumer, _)| consumer.as_str())
        .collect()
}

/// One consumer's view of a named queue. Every value from
/// [`RedisPool::queue`](super::RedisPool::queue) is a distinct consumer.
#[derive(Clone)]
pub struct RedisQueue {
    pool: Pool,
    keys: Arc<QueueKeys>,
    consumer: String,
    unacked: Arc<String>,
}

impl RedisQueue {
    pub(super) fn new(pool: Pool, name: &str) -> Self {
        let keys = QueueKeys::new(name);
        let consumer = Uuid::new_v4().to_string();
        let unacked = Arc::new(keys.unacked(&consumer));
        Self {
            pool,
            keys: Arc::new(keys),
            consumer,
            unacked,
        }
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer
    }

    /// Registers this consumer and refreshes its heartbeat for [`HEARTBEAT_TTL`].
    pub async fn heartbeat(&self) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .sadd(&self.keys.consumers, &self.consumer)
            .ignore()
            .cmd("SET")
            .arg(self.keys.heartbeat(&self.consumer))
            .arg(1)
            .arg("EX")
            .arg(HEARTBEAT_TTL.as_secs())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Returns what this consumer still holds to `ready` and unregisters it.
    ///
    /// Call only once no delivery of this consumer is in flight.
    pub async fn deregister(&self) -> Result<usize, QueueError> {
        let returned = self.move_all(&self.unacked, usize::MAX).await?;
        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .srem(&self.keys.consumers, &self.consumer)
            .ignore()
            .del(self.keys.heartbeat(&self.consumer))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(returned)
    }

    /// Moves the unacked deliveries of every consumer with an expired
    /// heartbeat back to `ready`. Live consumers are left alone.
    pub async fn return_stale_unacked(&self) -> Result<usize, QueueError> {
        let consumers: Vec<String>;
        let mut alive = Vec::new();
        {
            let mut conn = self.pool.get().await?;
            consumers = conn.smembers(&self.keys.consumers).await?;
            for consumer in &consumers {
                let beating: bool = conn.exists(self.keys.heartbeat(consumer)).await?;
                alive.push(beating);
            }
        }

        let mut returned = 0;
        for consumer in stale_consumers(&consumers, &alive, &self.consumer) {
            returned += self
                .move_all(&self.keys.unacked(consumer), usize::MAX)
                .await?;
            let mut conn = self.pool.get().await?;
            conn.srem::<_, _, ()>(&self.keys.consumers, consumer).await?;
            tracing::info!(consumer, "reclaimed stale consumer");
        }
        Ok(returned)
    }

    /// Moves up to `max` rejected deliveries back to `ready`.
    pub async fn return_rejected(&self, max: usize) -> Result<usize, QueueError> {
        self.move_all(&self.keys.rejected, max).await
    }

    async fn move_all(&self, from: &str, max: usize) -> Result<usize, QueueError> {
        let mut conn = self.pool.get().await?;
        let mut moved = 0;
        while moved < max {
            let payload: Option<Vec<u8>> = redis::cmd("LMOVE")
                .arg(from)
                .arg(&self.keys.ready)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            if payload.is_none() {
                break;
            }
            moved += 1;
        }
        if moved > 0 {
            tracing::info!(from, to = %self.keys.ready, moved, "returned deliveries to ready");
        }
        Ok(moved)
    }
}

#[async_trait]
impl QueueClient for RedisQueue {
    type Delivery = RedisDelivery;

    async fn publish(&self, payload: Bytes) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        conn.lpush::<_, _, ()>(&self.keys.ready, &payload[..])
            .await?;
        tracing::debug!(queue = %self.keys.ready, bytes = payload.len(), "published");
        Ok(())
    }

    async fn receive(&self, poll_interval: Duration) -> Result<Option<RedisDelivery>, QueueError> {
        let mut conn = self.pool.get().await?;
        let payload: Option<Vec<u8>> = redis::cmd("BLMOVE")
            .arg(&self.keys.ready)
            .arg(self.unacked.as_str())
            .arg("RIGHT")
            .arg("LEFT")
            .arg(poll_interval.as_secs_f64().max(MIN_BLOCK_SECS))
            .query_async(&mut conn)
            .await?;

        Ok(payload.map(|payload| RedisDelivery {
            payload: Bytes::from(payload),
            pool: self.pool.clone(),
            keys: self.keys.clone(),
            unacked: self.unacked.clone(),
        }))
    }
}

pub struct RedisDelivery {
    payload: Bytes,
    pool: Pool,
    keys: Arc<QueueKeys>,
    unacked: Arc<String>,
}

#[async_trait]
impl Delivery for RedisDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        let removed: usize = conn
            .lrem(self.unacked.as_str(), 1, &self.payload[..])
            .await?;
        if removed == 0 {
            tracing::warn!(queue = %self.unacked, "acked delivery was no longer unacked");
        }
        Ok(())
    }

    async fn reject(&self) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .lrem(self.unacked.as_str(), 1, &self.payload[..])
            .ignore()
            .lpush(&self.keys.rejected, &self.payload[..])
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::redis::RedisPool;

    fn pool() -> RedisPool {
        RedisPool::new("redis://127.0.0.1:1/").unwrap()
    }

    #[test]
    fn keys_are_namespaced_per_queue() {
        let keys = QueueKeys::new("video-transcode");
        assert_eq!(keys.ready, "transcode:queue:video-transcode:ready");
        assert_eq!(keys.rejected, "transcode:queue:video-transcode:rejected");
        assert_eq!(keys.consumers, "transcode:queue:video-transcode:consumers");
        assert_eq!(keys.unacked("c1"), "transcode:queue:video-transcode:unacked:c1");
        assert_eq!(keys.heartbeat("c1"), "transcode:queue:video-transcode:heartbeat:c1");
    }

    #[test]
    fn each_consumer_owns_its_unacked_list() {
        let pool = pool();
        let first = pool.queue("q");
        let second = pool.queue("q");
        assert_ne!(first.consumer_id(), second.consumer_id());
        assert_ne!(first.unacked, second.unacked);
    }

    #[test]
    fn only_expired_consumers_are_reclaimed() {
        let consumers = vec!["busy".to_string(), "crashed".to_string(), "me".to_string()];
        let stale = stale_consumers(&consumers, &[true, false, false], "me");
        assert_eq!(stale, vec!["crashed"]);

        assert!(stale_consumers(&consumers, &[true, true, true], "me").is_empty());
    }

    #[tokio::test]
    async fn unreachable_broker_is_a_pool_error() {
        let err = pool()
            .queue("q")
            .receive(Duration::from_millis(10))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, QueueError::Pool(_)));
    }

    /// Runs against a real server when `TRANSCODE_TEST_REDIS_URL` is set.
    #[tokio::test]
    async fn startup_reclaim_leaves_live_consumers_alone() {
        let Ok(url) = std::env::var("TRANSCODE_TEST_REDIS_URL") else {
            return;
        };
        let pool = RedisPool::new(&url).unwrap();
        let name = format!("test-{}", Uuid::new_v4());

        let busy = pool.queue(&name);
        busy.heartbeat().await.unwrap();
        busy.publish(Bytes::from_static(b"task")).await.unwrap();
        let delivery = busy
            .receive(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();

        let starting = pool.queue(&name);
        starting.heartbeat().await.unwrap();
        assert_eq!(starting.return_stale_unacked().await.unwrap(), 0);
        assert!(starting
            .receive(Duration::from_millis(50))
            .await
            .unwrap()
            .is_none());

        // The busy consumer's heartbeat lapses while it still holds the task.
        let mut conn = pool.pool.get().await.unwrap();
        conn.del::<_, ()>(busy.keys.heartbeat(busy.consumer_id()))
            .await
            .unwrap();
        drop(delivery);

        assert_eq!(starting.return_stale_unacked().await.unwrap(), 1);
        let redelivered = starting
            .receive(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redelivered.payload(), b"task");
        redelivered.ack().await.unwrap();
        starting.deregister().await.unwrap();
    }
}
