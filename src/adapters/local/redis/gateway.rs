//! Redis-backed metadata store. Videos are JSON strings, renditions a JSON list per video.

use super::KEY_PREFIX;
use crate::domain::error::PersistError;
use crate::domain::video::{Rendition, Video};
use crate::ports::persistence::PersistenceGateway;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;

fn video_key(id: &str) -> String {
    format!("{}:video:{}", KEY_PREFIX, id)
}

fn renditions_key(video_id: &str) -> String {
    format!("{}:video:{}:renditions", KEY_PREFIX, video_id)
}

#[derive(Clone)]
pub struct RedisGateway {
    pool: Pool,
}

impl RedisGateway {
    pub(super) fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Registers a video row; an existing row with the same id is replaced.
    pub async fn create_video(&self, video: Video) -> Result<Video, PersistError> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(&video)?;
        conn.set::<_, _, ()>(video_key(&video.id), json).await?;
        tracing::info!(video_id = %video.id, "video registered");
        Ok(video)
    }
}

#[async_trait]
impl PersistenceGateway for RedisGateway {
    async fn get_video(&self, id: &str) -> Result<Video, PersistError> {
        let mut conn = self.pool.get().await?;
        let json: Option<String> = conn.get(video_key(id)).await?;
        match json {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(PersistError::VideoNotFound(id.to_string())),
        }
    }

    async fn create_rendition(&self, rendition: Rendition) -> Result<Rendition, PersistError> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(&rendition)?;
        conn.rpush::<_, _, ()>(renditions_key(&rendition.video_id), json)
            .await?;
        tracing::debug!(video_id = %rendition.video_id, title = %rendition.title, "rendition recorded");
        Ok(rendition)
    }

    async fn update_video(&self, video: Video) -> Result<Video, PersistError> {
        let mut conn = self.pool.get().await?;
        let key = video_key(&video.id);
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(PersistError::VideoNotFound(video.id));
        }
        let json = serde_json::to_string(&video)?;
        conn.set::<_, _, ()>(&key, json).await?;
        Ok(video)
    }
}
