//! In-memory stand-ins for the queue, the metadata store, the media tools and
//! the orchestrator hop, used by unit tests and the pipeline tests.

mod memory_gateway;
mod memory_queue;
mod scripted_tools;
mod stub_trigger;

pub use memory_gateway::MemoryGateway;
pub use memory_queue::{MemoryDelivery, MemoryQueue};
pub use scripted_tools::ScriptedTools;
pub use stub_trigger::StubTrigger;
