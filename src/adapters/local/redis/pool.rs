//! Redis connection pool.

use super::gateway::RedisGateway;
use super::queue::RedisQueue;
use crate::ports::queue::QueueError;
use deadpool_redis::{Config, Pool, Runtime};

/// Shared connection pool; queues and gateways are cheap views over it.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
}

impl RedisPool {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    pub fn queue(&self, name: &str) -> RedisQueue {
        RedisQueue::new(self.pool.clone(), name)
    }

    pub fn gateway(&self) -> RedisGateway {
        RedisGateway::new(self.pool.clone())
    }
}
