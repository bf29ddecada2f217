use crate::domain::error::PersistError;
use crate::domain::video::{Rendition, Video};
use async_trait::async_trait;

/// Metadata store owning `Video` and `Rendition` rows.
///
/// Every call is a fallible remote call; callers log failures and never retry.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get_video(&self, id: &str) -> Result<Video, PersistError>;

    async fn create_rendition(&self, rendition: Rendition) -> Result<Rendition, PersistError>;

    async fn update_video(&self, video: Video) -> Result<Video, PersistError>;
}
