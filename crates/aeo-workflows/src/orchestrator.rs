//! Orchestrator - per-job state machine
//!
//! ```text
//! Initialized -> Planning -> Ready -> ExecutingPhase(i) -> Reasoning(i)
//!                                         ^                    |
//!                                         +--------------------+  (continue)
//! Reasoning(i) -> Completed   (reasoner stops, or no phases left)
//! ExecutingPhase(i) -> Failed (phase aborted)
//! ```
//!
//! A phase-level error is fatal to the job. Individual agent failures inside
//! a parallel phase are only visible in the context store and left for the
//! reasoner to judge.

use aeo_core::{
    AgentContext, AgentSummary, BlobRef, BlobStore, Error, ExecutionPhase, ExecutionPlan,
    OrchestratorConfig, PlanningOracle, Result, ResultReasoner, SummarizationOracle,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use crate::compression::{CompressionPolicy, OldestFractionPolicy};
use crate::context::{ContextStore, JobScope};
use crate::events::{EventBus, EventKind, PipelineEvent};
use crate::executor::AgentExecutor;
use crate::planner::PlanGenerator;

/// Orchestrator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum OrchestratorState {
    Initialized,
    Planning,
    /// Plan stored, no phase started yet
    Ready,
    ExecutingPhase(usize),
    Reasoning(usize),
    Completed,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Planning => write!(f, "planning"),
            Self::Ready => write!(f, "ready"),
            Self::ExecutingPhase(i) => write!(f, "executing-phase({})", i),
            Self::Reasoning(i) => write!(f, "reasoning({})", i),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Collaborators shared by every job
#[derive(Clone)]
pub struct PipelineServices {
    pub executor: Arc<AgentExecutor>,
    pub planning: Arc<dyn PlanningOracle>,
    pub summarizer: Arc<dyn SummarizationOracle>,
    pub reasoner: Arc<dyn ResultReasoner>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Final view of a job handed back to the job-status layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub job_id: String,
    pub state: OrchestratorState,
    pub phases_executed: usize,
    pub replans: u32,
    pub insights: Vec<String>,
    pub next_steps: Vec<String>,
    pub summaries: BTreeMap<String, AgentSummary>,
    pub artifact_refs: BTreeMap<String, BlobRef>,
    pub token_estimate: usize,
}

impl RunReport {
    pub fn completed_ids(&self) -> Vec<&str> {
        self.summaries
            .values()
            .filter(|s| s.status == aeo_core::AgentStatus::Completed)
            .map(|s| s.agent_id.as_str())
            .collect()
    }
}

/// Drives one job from planning to a terminal state
pub struct Orchestrator {
    job_id: String,
    tenant_id: String,
    services: PipelineServices,
    config: OrchestratorConfig,
    planner: PlanGenerator,
    compression: Box<dyn CompressionPolicy>,
    events: EventBus,
    state: OrchestratorState,
    plan: Option<ExecutionPlan>,
    context: Option<Arc<ContextStore>>,
    phases_executed: usize,
    replans: u32,
    insights: Vec<String>,
    next_steps: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        job_id: &str,
        tenant_id: &str,
        services: PipelineServices,
        config: OrchestratorConfig,
    ) -> Self {
        let planner = PlanGenerator::new(
            services.planning.clone(),
            services.executor.registry().clone(),
        );
        Self {
            job_id: job_id.to_string(),
            tenant_id: tenant_id.to_string(),
            compression: Box::new(OldestFractionPolicy::from_config(&config)),
            services,
            config,
            planner,
            events: EventBus::default(),
            state: OrchestratorState::Initialized,
            plan: None,
            context: None,
            phases_executed: 0,
            replans: 0,
            insights: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    /// Builder: swap the compression policy
    pub fn with_compression_policy(mut self, policy: Box<dyn CompressionPolicy>) -> Self {
        self.compression = policy;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    pub fn context(&self) -> Option<Arc<ContextStore>> {
        self.context.clone()
    }

    /// Create the job context and obtain a validated plan
    pub async fn initialize(&mut self, target_url: &str, domain: &str) -> Result<ExecutionPlan> {
        if self.state != OrchestratorState::Initialized {
            return Err(Error::InvalidState(format!(
                "initialize called in state {}",
                self.state
            )));
        }

        let context = Arc::new(
            ContextStore::new(
                JobScope::new(&self.job_id, &self.tenant_id, target_url, domain),
                self.services.blobs.clone(),
                self.services.summarizer.clone(),
            )
            .with_approach_ratio(self.config.compression_threshold)
            .with_events(self.events.clone()),
        );
        self.context = Some(context.clone());

        info!(job_id = %self.job_id, target_url, "Planning job");
        self.state = OrchestratorState::Planning;

        let snapshot = context.snapshot().await;
        let plan = match self.planner.create_plan(target_url, domain, &snapshot).await {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e)),
        };

        self.events.publish(
            &self.job_id,
            EventKind::PlanCreated {
                phases: plan.phase_names().iter().map(|s| s.to_string()).collect(),
            },
        );
        self.plan = Some(plan.clone());
        self.state = OrchestratorState::Ready;
        Ok(plan)
    }

    /// Execute the stored plan until the reasoner stops or phases run out
    #[instrument(skip(self), fields(job_id = %self.job_id))]
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.state != OrchestratorState::Ready {
            return Err(Error::InvalidState(format!("run called in state {}", self.state)));
        }
        let context = self
            .context
            .clone()
            .ok_or_else(|| Error::InvalidState("no context store".into()))?;

        let mut index = 0;
        loop {
            let Some(phase) = self.plan.as_ref().and_then(|p| p.phases.get(index)).cloned() else {
                break;
            };

            self.state = OrchestratorState::ExecutingPhase(index);
            info!(
                job_id = %self.job_id,
                phase = %phase.name,
                index,
                parallel = phase.run_in_parallel,
                "Executing phase"
            );
            self.events.publish(
                &self.job_id,
                EventKind::PhaseStarted {
                    index,
                    name: phase.name.clone(),
                    parallel: phase.run_in_parallel,
                },
            );

            let outcome = match self
                .services
                .executor
                .run_phase(&phase.agent_ids, phase.run_in_parallel, &context)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail_phase(&phase, &context, e).await),
            };
            self.phases_executed += 1;
            if !outcome.is_clean() {
                warn!(
                    job_id = %self.job_id,
                    phase = %phase.name,
                    failed = ?outcome.failed_ids(),
                    "Phase finished with agent failures"
                );
            }
            self.events.publish(
                &self.job_id,
                EventKind::PhaseFinished {
                    index,
                    name: phase.name.clone(),
                    completed: outcome.completed.len(),
                    failed: outcome.failures.len(),
                },
            );

            self.state = OrchestratorState::Reasoning(index);
            let snapshot = context.snapshot().await;
            let reasoning = match self.services.reasoner.reason(&snapshot).await {
                Ok(r) => r,
                Err(e) => return Err(self.fail(e)),
            };
            self.insights.extend(reasoning.insights.iter().cloned());
            if let Some(steps) = &reasoning.next_steps {
                self.next_steps = steps.clone();
            }

            if !reasoning.should_continue {
                info!(job_id = %self.job_id, phase = %phase.name, "Reasoner stopped the job");
                break;
            }

            let replan = reasoning.wants_replan() && self.replans < self.config.max_replans;
            let more_work = replan || index + 1 < self.phase_count();
            if more_work {
                self.maybe_compress(&context).await;
            }

            if replan {
                let adjustments = reasoning.adjustments.unwrap_or_default();
                if let Err(e) = self.replan(&context, &adjustments).await {
                    return Err(self.fail(e));
                }
                index = 0;
                continue;
            }

            index += 1;
        }

        self.state = OrchestratorState::Completed;
        self.events.publish(
            &self.job_id,
            EventKind::Completed {
                phases_executed: self.phases_executed,
            },
        );
        let report = self.report(&context.snapshot().await);
        info!(
            job_id = %self.job_id,
            phases = self.phases_executed,
            completed_agents = report.completed_ids().len(),
            "Job completed"
        );
        Ok(report)
    }

    /// `initialize` followed by `run`
    pub async fn execute(&mut self, target_url: &str, domain: &str) -> Result<RunReport> {
        self.initialize(target_url, domain).await?;
        self.run().await
    }

    fn phase_count(&self) -> usize {
        self.plan.as_ref().map_or(0, |p| p.phases.len())
    }

    async fn maybe_compress(&self, context: &ContextStore) {
        if !context
            .is_approaching_limit(self.config.context_token_limit)
            .await
        {
            return;
        }
        match context
            .compress(self.services.summarizer.as_ref(), self.compression.as_ref())
            .await
        {
            Ok(rewritten) => self.events.publish(
                &self.job_id,
                EventKind::ContextCompressed {
                    rewritten,
                    token_estimate: context.token_estimate().await,
                },
            ),
            // Compression is an optimization; the job continues uncompressed
            Err(e) => warn!(job_id = %self.job_id, error = %e, "Context compression failed"),
        }
    }

    /// Replace the plan with a fresh one minus the work already done
    async fn replan(&mut self, context: &ContextStore, adjustments: &[String]) -> Result<()> {
        self.state = OrchestratorState::Planning;
        let snapshot = context.snapshot().await;
        let scope = context.scope();
        let plan = self
            .planner
            .revise_plan(&scope.target_url, &scope.domain, &snapshot, adjustments)
            .await?;
        let plan = without_completed(plan, &snapshot);

        self.replans += 1;
        info!(
            job_id = %self.job_id,
            replans = self.replans,
            phases = plan.phases.len(),
            "Replanned job"
        );
        self.events.publish(
            &self.job_id,
            EventKind::Replanned {
                phases: plan.phase_names().iter().map(|s| s.to_string()).collect(),
            },
        );
        self.plan = Some(plan);
        Ok(())
    }

    /// Mark the phase's unsettled agents failed and fail the job
    async fn fail_phase(
        &mut self,
        phase: &ExecutionPhase,
        context: &ContextStore,
        err: Error,
    ) -> Error {
        let text = format!("phase '{}' aborted: {}", phase.name, err);
        for agent_id in &phase.agent_ids {
            let settled = context
                .status_of(agent_id)
                .await
                .is_some_and(|s| s.is_terminal());
            if !settled {
                context.mark_failed(agent_id, &text).await;
            }
        }
        self.fail(err)
    }

    fn fail(&mut self, err: Error) -> Error {
        error!(
            job_id = %self.job_id,
            state = %self.state,
            code = err.code(),
            error = %err,
            "Job failed"
        );
        self.state = OrchestratorState::Failed;
        self.events.publish(
            &self.job_id,
            EventKind::Failed {
                code: err.code().to_string(),
                error: err.to_string(),
            },
        );
        err
    }

    fn report(&self, snapshot: &AgentContext) -> RunReport {
        RunReport {
            job_id: self.job_id.clone(),
            state: self.state,
            phases_executed: self.phases_executed,
            replans: self.replans,
            insights: self.insights.clone(),
            next_steps: self.next_steps.clone(),
            summaries: snapshot.summaries.clone(),
            artifact_refs: snapshot.artifact_refs.clone(),
            token_estimate: snapshot.token_estimate,
        }
    }
}

/// Drop completed agents, then empty phases and references to them
fn without_completed(mut plan: ExecutionPlan, snapshot: &AgentContext) -> ExecutionPlan {
    let completed = snapshot.completed_ids();
    for phase in &mut plan.phases {
        phase.agent_ids.retain(|id| !completed.contains(id));
    }
    plan.phases.retain(|p| !p.agent_ids.is_empty());

    let remaining: HashSet<String> = plan.phases.iter().map(|p| p.name.clone()).collect();
    for phase in &mut plan.phases {
        phase.depends_on_phase_names.retain(|n| remaining.contains(n));
    }
    plan
}
