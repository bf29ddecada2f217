use crate::domain::error::TransportError;
use crate::domain::jobs::{TranscodeRequest, TriggerResponse};
use async_trait::async_trait;

/// The hop from the queue consumer to the orchestrator.
///
/// `Ok` means the orchestrator answered, whatever it answered.
/// `Err` means it could not be reached.
#[async_trait]
pub trait TranscodeTrigger: Send + Sync {
    async fn trigger(&self, request: &TranscodeRequest) -> Result<TriggerResponse, TransportError>;
}
