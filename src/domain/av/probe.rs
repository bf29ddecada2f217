use super::cmd::{check_output, ToolRunner};
use crate::domain::error::ProbeError;
use crate::domain::video::ProbeResult;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ProbeData {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Reads stream geometry from a media file with ffprobe.
#[derive(Clone)]
pub struct MediaProbe {
    runner: Arc<dyn ToolRunner>,
    program: String,
}

impl MediaProbe {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        tracing::debug!(path = %path.display(), "probing media");
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().into_owned(),
        ];

        let stdout = check_output(&self.program, self.runner.run(&self.program, &args).await)
            .map_err(|reason| ProbeError::ToolFailure {
                path: path.to_path_buf(),
                reason,
            })?;

        parse_dimensions(path, &stdout)
    }
}

/// First stream that reports a width wins; width-less streams (audio, data) are skipped.
pub fn parse_dimensions(path: &Path, stdout: &[u8]) -> Result<ProbeResult, ProbeError> {
    let data: ProbeData = serde_json::from_slice(stdout).map_err(|e| ProbeError::ToolFailure {
        path: path.to_path_buf(),
        reason: format!("unreadable probe output: {}", e),
    })?;

    let stream = data
        .streams
        .iter()
        .find(|stream| stream.width.is_some())
        .ok_or_else(|| ProbeError::NoStreamFound {
            path: path.to_path_buf(),
        })?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok(ProbeResult { width, height }),
        _ => Err(ProbeError::ToolFailure {
            path: path.to_path_buf(),
            reason: format!(
                "{} stream reports a width but no height",
                stream.codec_type.as_deref().unwrap_or("unknown")
            ),
        }),
    }
}
