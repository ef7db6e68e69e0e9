//! Contracts for the external collaborators consulted by the pipeline
//!
//! The planning, summarization and reasoning oracles embed model-driven
//! decisions; the scheduling core only sees these narrow interfaces, so
//! tests can substitute stubs returning fixed plans and verdicts.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{AgentContext, BlobRef, ExecutionPlan, OracleSummary, Reasoning};

/// Proposes an execution plan for a target
#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// `context_digest` lists completed and running agents so the oracle can
    /// skip work that is already done.
    async fn propose(
        &self,
        target_url: &str,
        domain: &str,
        context_digest: &str,
    ) -> Result<ExecutionPlan>;
}

/// Condenses full agent results into summaries
#[async_trait]
pub trait SummarizationOracle: Send + Sync {
    async fn summarize(&self, agent_id: &str, full_result: &Value) -> Result<OracleSummary>;

    /// Short text used when compressing the context
    async fn brief_summarize(&self, agent_id: &str, full_result: &Value) -> Result<String>;
}

/// Decides after each phase whether the pipeline should continue
#[async_trait]
pub trait ResultReasoner: Send + Sync {
    async fn reason(&self, context: &AgentContext) -> Result<Reasoning>;
}

/// Durable storage for full agent results
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `tenant_id/job_id/agent_id`, overwriting any previous value
    async fn put(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
        data: &Value,
    ) -> Result<BlobRef>;

    async fn get(&self, tenant_id: &str, job_id: &str, agent_id: &str) -> Result<Option<Value>>;
}
