use crate::domain::error::TransportError;
use crate::domain::jobs::{TranscodeRequest, TriggerResponse, TriggerStatus};
use crate::ports::trigger::TranscodeTrigger;
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every request and answers with a fixed status, or fails the transport.
pub struct StubTrigger {
    answer: Option<TriggerStatus>,
    requests: Mutex<Vec<TranscodeRequest>>,
}

impl StubTrigger {
    pub fn answering(status: TriggerStatus) -> Self {
        Self {
            answer: Some(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            answer: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodeTrigger for StubTrigger {
    async fn trigger(&self, request: &TranscodeRequest) -> Result<TriggerResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.answer {
            Some(status) => Ok(TriggerResponse {
                video_id: request.video_id.clone(),
                status,
                message: "stub".to_string(),
            }),
            None => Err(TransportError("connection refused".to_string())),
        }
    }
}
