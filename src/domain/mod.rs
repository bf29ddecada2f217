//! Domain layer - Pure business logic and the external tool components.

pub mod av;
pub mod error;
pub mod jobs;
pub mod ladder;
pub mod video;
