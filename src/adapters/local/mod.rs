//! Local adapters backed by a single Redis instance.

pub mod redis;

pub use redis::{RedisGateway, RedisPool, RedisQueue};
