//! aeo-workflows: Multi-phase agent orchestration
//!
//! Turns one "analyze this URL" request into a phased, multi-agent run:
//! - Planning oracle proposes phases of agents
//! - Executor runs each phase in parallel or in declaration order
//! - Context store keeps short summaries in memory and offloads full results
//! - Result reasoner decides after each phase whether to continue
//! - Context compression keeps the summary set under a token budget

pub mod compression;
pub mod context;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod planner;

pub use compression::{CompressionPolicy, OldestFractionPolicy};
pub use context::{ContextStore, JobScope};
pub use events::{EventBus, EventKind, PipelineEvent};
pub use executor::{AgentExecutor, AgentFailure, PhaseOutcome};
pub use orchestrator::{Orchestrator, OrchestratorState, PipelineServices, RunReport};
pub use planner::{context_digest, PlanGenerator};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::compression::{CompressionPolicy, OldestFractionPolicy};
    pub use super::context::{ContextStore, JobScope};
    pub use super::events::{EventBus, EventKind, PipelineEvent};
    pub use super::executor::{AgentExecutor, PhaseOutcome};
    pub use super::orchestrator::{Orchestrator, OrchestratorState, PipelineServices, RunReport};
    pub use super::planner::PlanGenerator;
}
