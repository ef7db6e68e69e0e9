//! Agent work-function contract
//!
//! The pipeline treats each agent's business logic as opaque: given the
//! job's target and the full results of its prerequisites, it returns a
//! JSON result or fails.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Everything an agent sees when it runs
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub job_id: String,
    pub tenant_id: String,
    pub target_url: String,
    pub domain: String,
    /// Full results of the agent's declared prerequisites, by agent id
    pub artifacts: HashMap<String, Value>,
}

impl AgentInput {
    /// Full result of a prerequisite agent
    pub fn artifact(&self, agent_id: &str) -> Option<&Value> {
        self.artifacts.get(agent_id)
    }
}

/// One unit of work in the pipeline
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, input: AgentInput) -> Result<Value>;
}

type BoxedAgentFn = Box<dyn Fn(AgentInput) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

struct FnAgent {
    func: BoxedAgentFn,
}

#[async_trait]
impl Agent for FnAgent {
    async fn run(&self, input: AgentInput) -> Result<Value> {
        (self.func)(input).await
    }
}

/// Wrap an async closure as an [`Agent`]
pub fn agent_fn<F, Fut>(f: F) -> Arc<dyn Agent>
where
    F: Fn(AgentInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnAgent {
        func: Box::new(move |input| Box::pin(f(input))),
    })
}
