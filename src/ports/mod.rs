//! Ports - Trait seams between the application and its infrastructure.

pub mod persistence;
pub mod queue;
pub mod trigger;
