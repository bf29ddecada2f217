use crate::application::consumer::InProcessTrigger;
use crate::domain::jobs::{TranscodeRequest, TriggerResponse, TriggerStatus};
use crate::ports::persistence::PersistenceGateway;
use crate::ports::trigger::TranscodeTrigger;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

pub const TRANSCODE_ROUTE: &str = "/api/v1/video-transcode";

/// `POST /api/v1/video-transcode` runs a whole job before answering.
/// `GET /health` answers 200 while the process is up.
pub fn router<P>(trigger: Arc<InProcessTrigger<P>>) -> Router
where
    P: PersistenceGateway + 'static,
{
    Router::new()
        .route(TRANSCODE_ROUTE, post(transcode::<P>))
        .route("/health", get(health))
        .with_state(trigger)
}

async fn transcode<P>(
    State(trigger): State<Arc<InProcessTrigger<P>>>,
    Json(request): Json<TranscodeRequest>,
) -> (StatusCode, Json<TriggerResponse>)
where
    P: PersistenceGateway + 'static,
{
    tracing::info!(video_id = %request.video_id, path = %request.path, "transcode requested");
    let response = match trigger.trigger(&request).await {
        Ok(response) => response,
        Err(e) => TriggerResponse {
            video_id: request.video_id.clone(),
            status: TriggerStatus::Rejected,
            message: e.to_string(),
        },
    };
    let code = match response.status {
        TriggerStatus::Accepted => StatusCode::OK,
        TriggerStatus::Rejected => StatusCode::BAD_REQUEST,
    };
    (code, Json(response))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::JobOrchestrator;
    use crate::domain::video::Video;
    use crate::testing::{MemoryGateway, ScriptedTools};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(tools: &Arc<ScriptedTools>, store: MemoryGateway) -> Router {
        let (probe, encoder, manifest) = tools.components();
        let orchestrator = Arc::new(JobOrchestrator::new(probe, encoder, manifest, store));
        router(Arc::new(InProcessTrigger::new(orchestrator)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(TRANSCODE_ROUTE)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_response(response: axum::response::Response) -> TriggerResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn successful_job_answers_200() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        let store = MemoryGateway::new();
        store.insert_video(Video::new("42", "in"));

        let response = app(&tools, store.clone())
            .oneshot(post_json(r#"{"path": "/media/42/in.mp4", "video_id": "42"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_response(response).await;
        assert_eq!(body.video_id, "42");
        assert_eq!(body.status, TriggerStatus::Accepted);
        assert!(store.video("42").unwrap().is_ready_to_serve);
    }

    #[tokio::test]
    async fn probe_failure_answers_400() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        tools.fail_source_probe();

        let response = app(&tools, MemoryGateway::new())
            .oneshot(post_json(r#"{"path": "/media/1/in.mp4", "video_id": "1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_response(response).await.status, TriggerStatus::Rejected);
        assert_eq!(tools.encode_attempts(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        let response = app(&tools, MemoryGateway::new())
            .oneshot(post_json(r#"{"video_id": 3}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(tools.encode_attempts(), 0);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        let response = app(&tools, MemoryGateway::new())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
