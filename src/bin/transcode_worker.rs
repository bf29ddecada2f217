//! Queue consumer - pulls transcode tasks from Redis and runs them.
//!
//! Jobs run in this process unless `ORCHESTRATOR_URL` points at a
//! `transcode_api` service, in which case each task is forwarded over HTTP.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use transcode_pipeline::adapters::http::HttpTrigger;
use transcode_pipeline::adapters::local::redis::HEARTBEAT_INTERVAL;
use transcode_pipeline::adapters::local::{RedisPool, RedisQueue};
use transcode_pipeline::application::consumer::{ConsumerConfig, InProcessTrigger, JobConsumer};
use transcode_pipeline::application::orchestrator::JobOrchestrator;
use transcode_pipeline::config::PipelineConfig;
use transcode_pipeline::ports::trigger::TranscodeTrigger;

/// Rejected deliveries moved back to ready per redelivery pass.
const REDELIVER_BATCH: usize = 100;

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
    let queue = Arc::new(pool.queue(&config.queue.queue_name));

    if let Err(e) = queue.heartbeat().await {
        eprintln!("Failed to register consumer: {}", e);
        std::process::exit(1);
    }
    tracing::info!(consumer = queue.consumer_id(), "consumer registered");

    let beating = queue.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = beating.heartbeat().await {
                tracing::warn!(error = %e, "heartbeat failed");
            }
        }
    });

    let redeliver = queue.clone();
    let every = config.queue.redeliver_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = redeliver.return_stale_unacked().await {
                tracing::warn!(error = %e, "stale delivery recovery failed");
            }
            if let Err(e) = redeliver.return_rejected(REDELIVER_BATCH).await {
                tracing::warn!(error = %e, "redelivery pass failed");
            }
        }
    });

    let consumer_config = config.worker.consumer.clone();
    match &config.worker.orchestrator_url {
        Some(url) => {
            let trigger = match HttpTrigger::new(url, None) {
                Ok(trigger) => trigger,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };
            tracing::info!(endpoint = trigger.endpoint(), "forwarding jobs to orchestrator");
            consume(queue, Arc::new(trigger), consumer_config).await;
        }
        None => {
            let (probe, encoder, manifest) = config.tools.components(config.media_base_url.clone());
            let orchestrator = Arc::new(JobOrchestrator::new(probe, encoder, manifest, pool.gateway()));
            tracing::info!("running jobs in process");
            consume(queue, Arc::new(InProcessTrigger::new(orchestrator)), consumer_config).await;
        }
    }
}

async fn consume<T>(queue: Arc<RedisQueue>, trigger: Arc<T>, config: ConsumerConfig)
where
    T: TranscodeTrigger + 'static,
{
    let consumer = Arc::new(JobConsumer::new(queue.clone(), trigger, config));
    consumer
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;
    match queue.deregister().await {
        Ok(returned) => tracing::info!(returned, "consumer stopped"),
        Err(e) => tracing::warn!(error = %e, "consumer stopped without deregistering"),
    }
}
