//! Error taxonomy for the transcode pipeline.
//!
//! Only `ProbeError` is fatal to a job. Encode failures drop a single
//! rendition, manifest and persist failures leave the video not-ready, and
//! only transport/decode failures reach the queue as a reject.

use std::path::PathBuf;
use thiserror::Error;

/// Source inspection failed; no rendition is attempted.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no video stream found in {path}")]
    NoStreamFound { path: PathBuf },

    #[error("probe tool failed on {path}: {reason}")]
    ToolFailure { path: PathBuf, reason: String },
}

/// One rendition could not be produced.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encoder failed for {height}p: {reason}")]
    ToolFailure { height: u32, reason: String },

    #[error("could not probe encoded {height}p output: {source}")]
    OutputProbe {
        height: u32,
        #[source]
        source: ProbeError,
    },

    #[error("invalid source path {path}")]
    InvalidSource { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no renditions to package")]
    NoRenditions,

    #[error("packager failed for {manifest}: {reason}")]
    ToolFailure { manifest: PathBuf, reason: String },
}

/// Errors returned by a `PersistenceGateway`.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("video {0} not found")]
    VideoNotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The consumer could not reach the orchestrator at all.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Job-level failure. Reached only from the probing state.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job for video {video_id} failed while probing: {source}")]
    Probe {
        video_id: String,
        #[source]
        source: ProbeError,
    },
}
