use super::server::TRANSCODE_ROUTE;
use crate::domain::error::TransportError;
use crate::domain::jobs::{TranscodeRequest, TriggerResponse, TriggerStatus};
use crate::ports::trigger::TranscodeTrigger;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Calls a remote orchestrator over HTTP.
///
/// Any HTTP answer counts as answered: 200 and 202 are accepted, every other
/// status is a refusal. Only failing to get an answer is a transport error.
#[derive(Clone)]
pub struct HttpTrigger {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTrigger {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), TRANSCODE_ROUTE),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TranscodeTrigger for HttpTrigger {
    async fn trigger(&self, request: &TranscodeRequest) -> Result<TriggerResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let code = response.status();
        let status = match code {
            StatusCode::OK | StatusCode::ACCEPTED => TriggerStatus::Accepted,
            _ => TriggerStatus::Rejected,
        };
        // A body that fails to arrive after the status line still counts as an answer.
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<TriggerResponse>(&body)
            .map(|parsed| parsed.message)
            .unwrap_or_else(|_| format!("{}: {}", code, body.trim()));

        tracing::debug!(video_id = %request.video_id, %code, "orchestrator answered");
        Ok(TriggerResponse {
            video_id: request.video_id.clone(),
            status,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;

    async fn serve(code: axum::http::StatusCode) -> String {
        let app = Router::new().route(TRANSCODE_ROUTE, post(move || async move { (code, "done") }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn request() -> TranscodeRequest {
        TranscodeRequest {
            path: "/media/42/in.mp4".to_string(),
            video_id: "42".to_string(),
        }
    }

    #[test]
    fn endpoint_joins_base_and_route() {
        let trigger = HttpTrigger::new("http://orchestrator:8080/", None).unwrap();
        assert_eq!(trigger.endpoint(), "http://orchestrator:8080/api/v1/video-transcode");
    }

    #[tokio::test]
    async fn ok_and_accepted_are_accepted() {
        for code in [axum::http::StatusCode::OK, axum::http::StatusCode::ACCEPTED] {
            let trigger = HttpTrigger::new(&serve(code).await, None).unwrap();
            let response = trigger.trigger(&request()).await.unwrap();
            assert_eq!(response.status, TriggerStatus::Accepted);
            assert_eq!(response.video_id, "42");
        }
    }

    #[tokio::test]
    async fn error_status_is_an_answer() {
        let base = serve(axum::http::StatusCode::BAD_REQUEST).await;
        let trigger = HttpTrigger::new(&base, None).unwrap();
        let response = trigger.trigger(&request()).await.unwrap();
        assert_eq!(response.status, TriggerStatus::Rejected);
        assert!(response.message.contains("done"));
    }

    #[tokio::test]
    async fn unreachable_orchestrator_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let trigger = HttpTrigger::new(&format!("http://{}", addr), Some(Duration::from_secs(2))).unwrap();
        assert!(trigger.trigger(&request()).await.is_err());
    }
}
