//! Core types and contracts for the AEO agent pipeline
//!
//! # Modules
//!
//! - `config`: Environment loading and orchestrator settings
//! - `error`: Error types and Result alias
//! - `logging`: Tracing subscriber bootstrap
//! - `traits`: Oracle and blob storage contracts
//! - `types`: Agent summaries, per-job context and execution plans

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

// Re-exports
pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use traits::{BlobStore, PlanningOracle, ResultReasoner, SummarizationOracle};
pub use types::*;
