//! Conversions from Redis and pool errors into the port error types.

use crate::domain::error::PersistError;
use crate::ports::queue::QueueError;
use deadpool_redis::CreatePoolError;

pub type RedisError = deadpool_redis::redis::RedisError;
pub type PoolError = deadpool_redis::PoolError;

impl From<RedisError> for QueueError {
    fn from(err: RedisError) -> Self {
        QueueError::Broker(err.to_string())
    }
}

impl From<PoolError> for QueueError {
    fn from(err: PoolError) -> Self {
        QueueError::Pool(err.to_string())
    }
}

impl From<CreatePoolError> for QueueError {
    fn from(err: CreatePoolError) -> Self {
        QueueError::Pool(format!("could not create pool: {}", err))
    }
}

impl From<RedisError> for PersistError {
    fn from(err: RedisError) -> Self {
        PersistError::Store(err.to_string())
    }
}

impl From<PoolError> for PersistError {
    fn from(err: PoolError) -> Self {
        PersistError::Store(format!("pool: {}", err))
    }
}
