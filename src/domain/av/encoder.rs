use super::cmd::{check_output, ToolRunner};
use super::probe::MediaProbe;
use crate::domain::error::EncodeError;
use crate::domain::ladder::EncodePreset;
use crate::domain::video::{OutputLayout, Rendition};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Produces one rendition of a source file at a target height.
#[derive(Clone)]
pub struct Encoder {
    runner: Arc<dyn ToolRunner>,
    probe: MediaProbe,
    program: String,
    audio_codec: String,
    media_base_url: Option<String>,
}

impl Encoder {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        probe: MediaProbe,
        program: impl Into<String>,
        audio_codec: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            probe,
            program: program.into(),
            audio_codec: audio_codec.into(),
            media_base_url: None,
        }
    }

    /// Public URLs become `<base>/<file name>` instead of the local file path.
    pub fn with_media_base_url(mut self, base_url: Option<String>) -> Self {
        self.media_base_url = base_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    pub fn encode_args(&self, source: &Path, output: &Path, height: u32) -> Vec<String> {
        let preset = EncodePreset::for_height(height);
        let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
        args.push(source.to_string_lossy().into_owned());
        args.extend(
            [
                "-c:a",
                self.audio_codec.as_str(),
                "-ac",
                "2",
                "-b:a",
                "128k",
                "-preset",
                "slow",
                "-c:v",
                "libx264",
                "-x264opts",
                "keyint=24:min-keyint=24:no-scenecut",
                "-b:v",
                preset.video_bitrate,
                "-maxrate",
                preset.max_rate,
                "-bufsize",
                preset.buffer_size,
                "-vf",
            ]
            .iter()
            .map(|arg| arg.to_string()),
        );
        args.push(format!("scale=-2:{}", height));
        args.push(output.to_string_lossy().into_owned());
        args
    }

    /// Encodes `source` to `<dir>/<base>_<height>.mp4` and re-probes the result.
    ///
    /// The returned rendition carries the measured geometry of the output, which
    /// can differ from the nominal bucket after aspect-ratio rounding.
    pub async fn encode(
        &self,
        source: &Path,
        video_id: &str,
        height: u32,
    ) -> Result<Rendition, EncodeError> {
        let layout = OutputLayout::for_source(source).ok_or_else(|| EncodeError::InvalidSource {
            path: source.to_path_buf(),
        })?;
        let output = layout.rendition_path(height);

        tracing::info!(video_id, height, output = %output.display(), "encoding rendition");
        let args = self.encode_args(source, &output, height);
        check_output(&self.program, self.runner.run(&self.program, &args).await)
            .map_err(|reason| EncodeError::ToolFailure { height, reason })?;

        let measured = self
            .probe
            .probe(&output)
            .await
            .map_err(|source| EncodeError::OutputProbe { height, source })?;

        let file_path = output.to_string_lossy().into_owned();
        Ok(Rendition {
            id: Uuid::new_v4().to_string(),
            title: layout.title(height),
            url: self.url_for(&output, &file_path),
            file_path,
            width: measured.width,
            height: measured.height,
            video_id: video_id.to_string(),
        })
    }

    fn url_for(&self, output: &Path, file_path: &str) -> String {
        match (&self.media_base_url, output.file_name()) {
            (Some(base), Some(name)) => format!("{}/{}", base, name.to_string_lossy()),
            _ => file_path.to_string(),
        }
    }
}
