use super::cmd::{check_output, ToolRunner};
use crate::domain::error::ManifestError;
use crate::domain::video::OutputLayout;
use std::path::PathBuf;
use std::sync::Arc;

/// DASH segment and fragment length in milliseconds.
const SEGMENT_MS: &str = "3000";

/// Packages renditions into a single DASH manifest with MP4Box.
#[derive(Clone)]
pub struct ManifestBuilder {
    runner: Arc<dyn ToolRunner>,
    program: String,
}

impl ManifestBuilder {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// All video references in ladder order, then all audio references in the same order.
    pub fn build_args(&self, layout: &OutputLayout, heights: &[u32]) -> Vec<String> {
        let mut args: Vec<String> = [
            "-dash",
            SEGMENT_MS,
            "-frag",
            SEGMENT_MS,
            "-rap",
            "-profile",
            "dashavc264:onDemand",
            "-out",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        args.push(layout.manifest_path().to_string_lossy().into_owned());

        for track in ["video", "audio"] {
            for height in heights {
                args.push(format!(
                    "{}#{}",
                    layout.rendition_path(*height).to_string_lossy(),
                    track
                ));
            }
        }
        args
    }

    pub async fn build(
        &self,
        layout: &OutputLayout,
        heights: &[u32],
    ) -> Result<PathBuf, ManifestError> {
        if heights.is_empty() {
            return Err(ManifestError::NoRenditions);
        }

        let manifest = layout.manifest_path();
        tracing::info!(manifest = %manifest.display(), ?heights, "building manifest");

        let args = self.build_args(layout, heights);
        check_output(&self.program, self.runner.run(&self.program, &args).await).map_err(
            |reason| ManifestError::ToolFailure {
                manifest: manifest.clone(),
                reason,
            },
        )?;

        Ok(manifest)
    }
}
