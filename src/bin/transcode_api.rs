//! Orchestrator service - runs transcode jobs on `POST /api/v1/video-transcode`.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use transcode_pipeline::adapters::http::router;
use transcode_pipeline::adapters::local::RedisPool;
use transcode_pipeline::application::consumer::InProcessTrigger;
use transcode_pipeline::application::orchestrator::JobOrchestrator;
use transcode_pipeline::config::PipelineConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match RedisPool::new(&config.queue.redis_url) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to connect to Redis: {}", e);
            std::process::exit(1);
        }
    };

    let (probe, encoder, manifest) = config.tools.components(config.media_base_url.clone());
    let orchestrator = Arc::new(JobOrchestrator::new(probe, encoder, manifest, pool.gateway()));
    let app = router(Arc::new(InProcessTrigger::new(orchestrator)));

    let address = config.api.bind_address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", address, e);
            std::process::exit(1);
        }
    };
    tracing::info!(%address, "listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
