//! Configuration loaded once from the environment (and `.env`) at startup.

use crate::application::consumer::ConsumerConfig;
use crate::domain::av::{Encoder, ManifestBuilder, MediaProbe, ProcessRunner, ToolRunner};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

/// Locations and settings of the external media tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub mp4box: String,
    pub audio_codec: String,
    /// Wall-clock limit per tool invocation. Unset means no limit.
    pub timeout: Option<Duration>,
}

impl ToolConfig {
    /// Probe, encoder and packager sharing one process runner.
    pub fn components(
        &self,
        media_base_url: Option<String>,
    ) -> (MediaProbe, Encoder, ManifestBuilder) {
        let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner::new(self.timeout));
        let probe = MediaProbe::new(runner.clone(), self.ffprobe.clone());
        let encoder = Encoder::new(
            runner.clone(),
            probe.clone(),
            self.ffmpeg.clone(),
            self.audio_codec.clone(),
        )
        .with_media_base_url(media_base_url);
        let manifest = ManifestBuilder::new(runner, self.mp4box.clone());
        (probe, encoder, manifest)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub redis_url: String,
    pub queue_name: String,
    pub poll_interval: Duration,
    /// How often rejected deliveries are moved back to ready.
    pub redeliver_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub consumer: ConsumerConfig,
    /// Remote orchestrator base URL. Unset runs jobs in the worker process.
    pub orchestrator_url: Option<String>,
}

/// Bind address of the orchestrator HTTP service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub addr: String,
    pub port: String,
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub tools: ToolConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub api: ApiConfig,
    pub media_base_url: Option<String>,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let tools = ToolConfig {
            ffprobe: var("FFPROBE_BIN", "ffprobe"),
            ffmpeg: var("FFMPEG_BIN", "ffmpeg"),
            mp4box: var("MP4BOX_BIN", "MP4Box"),
            audio_codec: var("AUDIO_CODEC", "aac"),
            timeout: optional_secs(&lookup, "TOOL_TIMEOUT_SECS")?,
        };

        let queue = QueueConfig {
            redis_url: var("REDIS_URL", "redis://127.0.0.1/"),
            queue_name: optional("QUEUE_NAME")
                .or_else(|| optional("REDIS_TOPIC"))
                .unwrap_or_else(|| "video-transcode".to_string()),
            poll_interval: secs(&lookup, "POLL_INTERVAL_SECS", 10)?,
            redeliver_interval: secs(&lookup, "REDELIVER_INTERVAL_SECS", 60)?,
        };

        let worker = WorkerConfig {
            consumer: ConsumerConfig {
                workers: number(&lookup, "WORKER_POOL_SIZE", 1)? as usize,
                poll_interval: queue.poll_interval,
            },
            orchestrator_url: optional("ORCHESTRATOR_URL"),
        };

        let api = ApiConfig {
            addr: var("ADDR", "127.0.0.1"),
            port: var("PORT", "3000"),
        };

        Ok(Self {
            tools,
            queue,
            worker,
            api,
            media_base_url: optional("MEDIA_BASE_URL"),
        })
    }
}

fn number<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value })?,
        None => default,
    };
    if value == 0 {
        return Err(ConfigError::Zero { var });
    }
    Ok(value)
}

fn secs<F>(lookup: &F, var: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    number(lookup, var, default).map(Duration::from_secs)
}

fn optional_secs<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { var, value })?;
            Ok(Some(Duration::from_secs(secs)).filter(|d| !d.is_zero()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_run_everything_in_one_process() {
        let config = load(&[]).unwrap();
        assert_eq!(config.tools.ffprobe, "ffprobe");
        assert_eq!(config.tools.mp4box, "MP4Box");
        assert_eq!(config.tools.audio_codec, "aac");
        assert_eq!(config.tools.timeout, None);
        assert_eq!(config.queue.queue_name, "video-transcode");
        assert_eq!(config.queue.poll_interval, Duration::from_secs(10));
        assert_eq!(config.worker.consumer.workers, 1);
        assert!(config.worker.orchestrator_url.is_none());
        assert!(config.media_base_url.is_none());
        assert_eq!(config.api.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("FFMPEG_BIN", "/opt/ffmpeg/bin/ffmpeg"),
            ("AUDIO_CODEC", "libfdk_aac"),
            ("TOOL_TIMEOUT_SECS", "3600"),
            ("REDIS_TOPIC", "uploads"),
            ("POLL_INTERVAL_SECS", "2"),
            ("WORKER_POOL_SIZE", "4"),
            ("ORCHESTRATOR_URL", "http://api:3000"),
            ("MEDIA_BASE_URL", "https://cdn.test/v"),
        ])
        .unwrap();
        assert_eq!(config.tools.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.tools.audio_codec, "libfdk_aac");
        assert_eq!(config.tools.timeout, Some(Duration::from_secs(3600)));
        assert_eq!(config.queue.queue_name, "uploads");
        assert_eq!(config.worker.consumer.poll_interval, Duration::from_secs(2));
        assert_eq!(config.worker.consumer.workers, 4);
        assert_eq!(config.worker.orchestrator_url.as_deref(), Some("http://api:3000"));
        assert_eq!(config.media_base_url.as_deref(), Some("https://cdn.test/v"));
    }

    #[test]
    fn queue_name_wins_over_topic() {
        let config = load(&[("QUEUE_NAME", "a"), ("REDIS_TOPIC", "b")]).unwrap();
        assert_eq!(config.queue.queue_name, "a");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert_eq!(
            load(&[("WORKER_POOL_SIZE", "many")]).unwrap_err(),
            ConfigError::InvalidNumber {
                var: "WORKER_POOL_SIZE",
                value: "many".to_string()
            }
        );
        assert_eq!(
            load(&[("POLL_INTERVAL_SECS", "0")]).unwrap_err(),
            ConfigError::Zero {
                var: "POLL_INTERVAL_SECS"
            }
        );
        assert!(load(&[("TOOL_TIMEOUT_SECS", "-1")]).is_err());
    }

    #[test]
    fn blank_optionals_are_unset() {
        let config = load(&[("ORCHESTRATOR_URL", " "), ("TOOL_TIMEOUT_SECS", "0")]).unwrap();
        assert!(config.worker.orchestrator_url.is_none());
        assert_eq!(config.tools.timeout, None);
    }
}
