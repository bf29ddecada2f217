use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stream geometry reported by the probe tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
}

/// One encoded output file of a source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub id: String,
    pub title: String,
    pub file_path: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub video_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub is_ready_to_serve: bool,
    pub stream_file_path: Option<String>,
    #[serde(default)]
    pub renderings: Vec<Rendition>,
}

impl Video {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_ready_to_serve: false,
            stream_file_path: None,
            renderings: Vec::new(),
        }
    }
}

/// Output naming for one source file: `<dir>/<base>_<height>.mp4` and `<dir>/<base>.mpd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub base: String,
}

impl OutputLayout {
    /// Returns `None` when the path has no file name.
    pub fn for_source(source: &Path) -> Option<Self> {
        let file_name = source.file_name()?.to_str()?;
        let base = match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.replace('.', "_"),
            _ => file_name.to_string(),
        };
        let dir = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Some(Self { dir, base })
    }

    pub fn title(&self, height: u32) -> String {
        format!("{}_{}", self.base, height)
    }

    pub fn rendition_path(&self, height: u32) -> PathBuf {
        self.dir.join(format!("{}.mp4", self.title(height)))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.mpd", self.base))
    }
}
