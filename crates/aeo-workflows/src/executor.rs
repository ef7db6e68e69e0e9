//! Agent executor with dependency gating, deadlines and bounded parallelism
//!
//! A parallel phase is a full barrier: every launched agent settles as
//! completed or failed before `run_phase` returns, and one agent's failure
//! never discards a sibling's result. A sequential phase stops at the first
//! failure.

use aeo_agents::{Agent, AgentInput, AgentRegistry};
use aeo_core::{AgentStatus, Error, OrchestratorConfig, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::context::ContextStore;
use crate::events::EventKind;

/// An agent that settled as failed during a phase
#[derive(Debug)]
pub struct AgentFailure {
    pub agent_id: String,
    pub error: Error,
}

/// Per-agent outcome of one phase
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    /// Completed agents, in declaration order
    pub completed: Vec<String>,
    pub failures: Vec<AgentFailure>,
}

impl PhaseOutcome {
    /// True when no agent failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.agent_id.as_str()).collect()
    }
}

/// Runs phases of agents against a job's context store
pub struct AgentExecutor {
    registry: Arc<AgentRegistry>,
    agents: HashMap<String, Arc<dyn Agent>>,
    agent_timeout: Option<Duration>,
    semaphore: Arc<Semaphore>,
}

impl AgentExecutor {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            registry,
            agents: HashMap::new(),
            agent_timeout: defaults.agent_timeout(),
            semaphore: Arc::new(Semaphore::new(defaults.max_parallel_agents)),
        }
    }

    /// Deadline and parallelism taken from the orchestrator settings
    pub fn from_config(registry: Arc<AgentRegistry>, config: &OrchestratorConfig) -> Self {
        Self::new(registry)
            .with_timeout(config.agent_timeout())
            .with_max_parallel(config.max_parallel_agents)
    }

    /// Builder: per-agent deadline (`None` disables it)
    pub fn with_timeout(mut self, agent_timeout: Option<Duration>) -> Self {
        self.agent_timeout = agent_timeout;
        self
    }

    /// Builder: cap on concurrently running agents
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        self
    }

    /// Attach the work function for a catalog agent
    pub fn register_agent(&mut self, agent_id: &str, agent: Arc<dyn Agent>) -> Result<()> {
        self.registry.get(agent_id)?;
        if self.agents.insert(agent_id.to_string(), agent).is_some() {
            debug!(agent_id, "Replaced work function");
        }
        Ok(())
    }

    /// Builder form of [`register_agent`](Self::register_agent)
    pub fn with_agent(mut self, agent_id: &str, agent: Arc<dyn Agent>) -> Result<Self> {
        self.register_agent(agent_id, agent)?;
        Ok(self)
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Run one phase.
    ///
    /// Returns `Err` for unknown agents, unsatisfied dependencies and the
    /// first failure of a sequential phase. Failures inside a parallel phase
    /// are reported in the outcome.
    pub async fn run_phase(
        &self,
        agent_ids: &[String],
        parallel: bool,
        context: &ContextStore,
    ) -> Result<PhaseOutcome> {
        for agent_id in agent_ids {
            self.registry.get(agent_id)?;
            if !self.has_agent(agent_id) {
                return Err(Error::AgentNotRegistered(agent_id.clone()));
            }
        }

        if parallel {
            self.run_parallel(agent_ids, context).await
        } else {
            self.run_sequential(agent_ids, context).await
        }
    }

    async fn run_parallel(
        &self,
        agent_ids: &[String],
        context: &ContextStore,
    ) -> Result<PhaseOutcome> {
        // Nothing starts unless the whole phase may start
        let completed = context.completed_ids().await;
        for agent_id in agent_ids {
            self.check_dependencies(agent_id, &completed)?;
        }

        info!(job_id = %context.job_id(), agents = agent_ids.len(), "Running parallel phase");

        let runs = agent_ids.iter().map(|agent_id| async move {
            let result = match self.semaphore.acquire().await {
                Ok(_permit) => self.run_agent(agent_id, context).await,
                Err(_) => Err(Error::internal("executor semaphore closed")),
            };
            (agent_id, result)
        });

        let mut outcome = PhaseOutcome::default();
        for (agent_id, result) in join_all(runs).await {
            match result {
                Ok(()) => outcome.completed.push(agent_id.clone()),
                Err(error) => outcome.failures.push(AgentFailure {
                    agent_id: agent_id.clone(),
                    error,
                }),
            }
        }
        Ok(outcome)
    }

    async fn run_sequential(
        &self,
        agent_ids: &[String],
        context: &ContextStore,
    ) -> Result<PhaseOutcome> {
        info!(job_id = %context.job_id(), agents = agent_ids.len(), "Running sequential phase");

        let mut outcome = PhaseOutcome::default();
        for agent_id in agent_ids {
            let completed = context.completed_ids().await;
            self.check_dependencies(agent_id, &completed)?;
            self.run_agent(agent_id, context).await?;
            outcome.completed.push(agent_id.clone());
        }
        Ok(outcome)
    }

    fn check_dependencies(
        &self,
        agent_id: &str,
        completed: &std::collections::HashSet<String>,
    ) -> Result<()> {
        let missing = self.registry.missing_dependencies(agent_id, completed)?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::DependencyUnsatisfied {
                agent: agent_id.to_string(),
                missing,
            })
        }
    }

    /// Drive one agent to a terminal status in the context store
    #[instrument(skip(self, context), fields(job_id = %context.job_id()))]
    async fn run_agent(&self, agent_id: &str, context: &ContextStore) -> Result<()> {
        let agent = self
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| Error::AgentNotRegistered(agent_id.to_string()))?;

        context.mark_running(agent_id).await;
        context.events().publish(
            context.job_id(),
            EventKind::AgentStarted {
                agent_id: agent_id.to_string(),
            },
        );

        let result = match self.invoke(agent_id, agent.as_ref(), context).await {
            Ok(full_result) => context.store_result(agent_id, full_result).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) if summary.status == AgentStatus::Failed => {
                // The summarizer's text is already stored on the summary
                warn!(error = %summary.summary, "Agent result judged failed");
                context.events().publish(
                    context.job_id(),
                    EventKind::AgentFailed {
                        agent_id: agent_id.to_string(),
                        error: summary.summary.clone(),
                    },
                );
                Err(Error::agent_failed(agent_id, summary.summary))
            }
            Ok(_) => {
                debug!("Agent completed");
                context.events().publish(
                    context.job_id(),
                    EventKind::AgentCompleted {
                        agent_id: agent_id.to_string(),
                    },
                );
                Ok(())
            }
            Err(e) => {
                let text = failure_text(&e);
                warn!(error = %text, "Agent failed");
                context.mark_failed(agent_id, &text).await;
                context.events().publish(
                    context.job_id(),
                    EventKind::AgentFailed {
                        agent_id: agent_id.to_string(),
                        error: text,
                    },
                );
                Err(e)
            }
        }
    }

    async fn invoke(
        &self,
        agent_id: &str,
        agent: &dyn Agent,
        context: &ContextStore,
    ) -> Result<serde_json::Value> {
        let input = self.build_input(agent_id, context).await?;
        let run = agent.run(input);

        let outcome = match self.agent_timeout {
            Some(deadline) => timeout(deadline, run).await.map_err(|_| Error::AgentTimeout {
                agent: agent_id.to_string(),
                elapsed: deadline,
            })?,
            None => run.await,
        };

        outcome.map_err(|e| Error::agent_failed(agent_id, format!("{:#}", e)))
    }

    /// Target plus the full results of every declared prerequisite
    async fn build_input(&self, agent_id: &str, context: &ContextStore) -> Result<AgentInput> {
        let scope = context.scope();
        let mut artifacts = HashMap::new();
        for dependency in &self.registry.get(agent_id)?.dependencies {
            if let Some(full) = context.get_full_result(dependency).await? {
                artifacts.insert(dependency.clone(), full);
            }
        }
        Ok(AgentInput {
            job_id: scope.job_id.clone(),
            tenant_id: scope.tenant_id.clone(),
            target_url: scope.target_url.clone(),
            domain: scope.domain.clone(),
            artifacts,
        })
    }
}

/// Text stored on a failed summary
fn failure_text(error: &Error) -> String {
    match error {
        Error::AgentExecutionFailed { message, .. } => message.clone(),
        Error::AgentTimeout { elapsed, .. } => format!("timed out after {:?}", elapsed),
        other => other.to_string(),
    }
}
