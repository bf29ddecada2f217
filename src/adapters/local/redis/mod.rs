//! Redis adapters: the reliable-list task queue and the metadata store.

mod error;
mod gateway;
mod pool;
mod queue;

pub use gateway::RedisGateway;
pub use pool::RedisPool;
pub use queue::{RedisDelivery, RedisQueue, HEARTBEAT_INTERVAL, HEARTBEAT_TTL};

const KEY_PREFIX: &str = "transcode";
