//! Application layer - Services that drive the domain through the ports.

pub mod consumer;
pub mod orchestrator;
