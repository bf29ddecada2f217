//! Registers a video and publishes its transcode task.
//!
//! Usage: `enqueue <video-id> <source-path> [title]`

use bytes::Bytes;
use std::path::Path;
use transcode_pipeline::adapters::local::RedisPool;
use transcode_pipeline::config::PipelineConfig;
use transcode_pipeline::domain::jobs::Task;
use transcode_pipeline::domain::video::{OutputLayout, Video};
use transcode_pipeline::ports::queue::QueueClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (video_id, path) = match (args.first(), args.get(1)) {
        (Some(id), Some(path)) => (id.clone(), path.clone()),
        _ => {
            eprintln!("usage: enqueue <video-id> <source-path> [title]");
            std::process::exit(2);
        }
    };
    let title = match args.get(2) {
        Some(title) => title.clone(),
        None => match OutputLayout::for_source(Path::new(&path)) {
            Some(layout) => layout.base,
            None => {
                eprintln!("{} has no file name", path);
                std::process::exit(2);
            }
        },
    };

    if let Err(e) = run(video_id, path, title).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(video_id: String, path: String, title: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    let pool = RedisPool::new(&config.queue.redis_url)?;

    pool.gateway().create_video(Video::new(&video_id, title)).await?;

    let task = Task::new(video_id, path);
    pool.queue(&config.queue.queue_name)
        .publish(Bytes::from(task.to_payload()?))
        .await?;
    tracing::info!(video_id = %task.id, queue = %config.queue.queue_name, "task published");
    Ok(())
}
