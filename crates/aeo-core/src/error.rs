//! Error types for the agent pipeline

use std::time::Duration;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent '{agent}' has unsatisfied dependencies: {}", .missing.join(", "))]
    DependencyUnsatisfied { agent: String, missing: Vec<String> },

    #[error("Agent '{agent}' failed: {message}")]
    AgentExecutionFailed { agent: String, message: String },

    #[error("Agent '{agent}' timed out after {elapsed:?}")]
    AgentTimeout { agent: String, elapsed: Duration },

    #[error("No work function registered for agent: {0}")]
    AgentNotRegistered(String),

    #[error("Invalid execution plan: {0}")]
    OraclePlanInvalid(String),

    #[error("Oracle call failed: {0}")]
    OracleCallFailed(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an agent execution error
    pub fn agent_failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Error::AgentExecutionFailed {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create an invalid plan error
    pub fn plan_invalid(msg: impl Into<String>) -> Self {
        Error::OraclePlanInvalid(msg.into())
    }

    /// Create an oracle call error
    pub fn oracle_call(msg: impl Into<String>) -> Self {
        Error::OracleCallFailed(msg.into())
    }

    /// Create a blob store error
    pub fn blob_store(msg: impl Into<String>) -> Self {
        Error::BlobStore(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Stable error code attached to the job record by the status layer
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownAgent(_) => "UNKNOWN_AGENT",
            Error::DependencyUnsatisfied { .. } => "DEPENDENCY_UNSATISFIED",
            Error::AgentExecutionFailed { .. } => "AGENT_EXECUTION_FAILED",
            Error::AgentTimeout { .. } => "AGENT_TIMEOUT",
            Error::AgentNotRegistered(_) => "AGENT_NOT_REGISTERED",
            Error::OraclePlanInvalid(_) => "ORACLE_PLAN_INVALID",
            Error::OracleCallFailed(_) => "ORACLE_CALL_FAILED",
            Error::BlobStore(_) => "BLOB_STORE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Config(_) => "CONFIGURATION_ERROR",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the calling queue may re-enqueue the job after this error.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::OracleCallFailed(_) | Error::AgentTimeout { .. } | Error::BlobStore(_)
        )
    }

    /// Programmer or catalog errors that must abort the job outright
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownAgent(_)
                | Error::DependencyUnsatisfied { .. }
                | Error::AgentNotRegistered(_)
                | Error::Config(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
