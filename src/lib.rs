//! Transcode pipeline - turns uploaded videos into an adaptive-bitrate ladder
//! of MP4 renditions plus a DASH manifest.
//!
//! Hexagonal Architecture:
//! - domain/: Pure data, the rendition ladder and the external tool components
//! - ports/: Trait seams (queue, metadata store, orchestration hop)
//! - adapters/: Redis queue and store, HTTP orchestrator service and client
//! - application/: Job orchestrator and queue consumer
//! - testing/: In-memory fakes for the ports and the media tools
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod testing;

pub use application::consumer::{ConsumerConfig, JobConsumer};
pub use application::orchestrator::{JobOrchestrator, JobOutcome, JobReport};
pub use config::PipelineConfig;
