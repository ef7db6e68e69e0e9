//! aeo-agents: Agent catalog and work-function contract
//!
//! Features:
//! - Static catalog of agent ids with declared prerequisites
//! - Dependency checks against the set of completed agents
//! - `Agent` trait for the opaque per-agent work functions

pub mod agent;
pub mod registry;

pub use agent::{agent_fn, Agent, AgentInput};
pub use registry::{AgentDefinition, AgentRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::agent::{agent_fn, Agent, AgentInput};
    pub use super::registry::{AgentDefinition, AgentRegistry};
}
