//! Plan generation
//!
//! The planning oracle decides which agents run in which phases. This module
//! builds the context digest it is given and rejects malformed plans.

use aeo_agents::AgentRegistry;
use aeo_core::{AgentContext, AgentStatus, Error, ExecutionPlan, PlanningOracle, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Compact text view of a context: completed agents with their headline,
/// running agents and the total count.
pub fn context_digest(context: &AgentContext) -> String {
    let mut completed = Vec::new();
    let mut running = Vec::new();
    for summary in context.summaries.values() {
        match summary.status {
            AgentStatus::Completed => {
                completed.push(format!("- {}: {}", summary.agent_id, summary.headline()))
            }
            AgentStatus::Running => running.push(summary.agent_id.as_str()),
            _ => {}
        }
    }

    let mut out = String::from("Completed agents:\n");
    if completed.is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str(&completed.join("\n"));
        out.push('\n');
    }
    out.push_str("Running agents: ");
    out.push_str(&if running.is_empty() {
        "(none)".to_string()
    } else {
        running.join(", ")
    });
    out.push_str(&format!("\nTotal agents: {}", context.summaries.len()));
    out
}

/// Asks the planning oracle for a plan and validates it against the catalog
pub struct PlanGenerator {
    oracle: Arc<dyn PlanningOracle>,
    registry: Arc<AgentRegistry>,
}

impl PlanGenerator {
    pub fn new(oracle: Arc<dyn PlanningOracle>, registry: Arc<AgentRegistry>) -> Self {
        Self { oracle, registry }
    }

    pub async fn create_plan(
        &self,
        target_url: &str,
        domain: &str,
        snapshot: &AgentContext,
    ) -> Result<ExecutionPlan> {
        self.request(target_url, domain, context_digest(snapshot)).await
    }

    /// Ask for a replacement plan, passing the reasoner's adjustments along
    /// with the digest
    pub async fn revise_plan(
        &self,
        target_url: &str,
        domain: &str,
        snapshot: &AgentContext,
        adjustments: &[String],
    ) -> Result<ExecutionPlan> {
        let mut digest = context_digest(snapshot);
        if !adjustments.is_empty() {
            digest.push_str("\nRequested adjustments:\n");
            digest.push_str(
                &adjustments
                    .iter()
                    .map(|a| format!("- {}", a))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        self.request(target_url, domain, digest).await
    }

    async fn request(
        &self,
        target_url: &str,
        domain: &str,
        digest: String,
    ) -> Result<ExecutionPlan> {
        debug!(target_url, domain, digest_len = digest.len(), "Requesting plan");

        let plan = self.oracle.propose(target_url, domain, &digest).await?;
        self.validate(&plan)?;

        info!(
            target_url,
            phases = plan.phases.len(),
            agents = plan.phases.iter().map(|p| p.agent_ids.len()).sum::<usize>(),
            "Execution plan created"
        );
        Ok(plan)
    }

    /// Reject plans the executor could not run as written
    pub fn validate(&self, plan: &ExecutionPlan) -> Result<()> {
        let mut seen_phases: HashSet<&str> = HashSet::new();

        for phase in &plan.phases {
            if phase.name.trim().is_empty() {
                return Err(Error::plan_invalid("phase with empty name"));
            }

            for earlier in &phase.depends_on_phase_names {
                if !seen_phases.contains(earlier.as_str()) {
                    return Err(Error::plan_invalid(format!(
                        "phase '{}' depends on '{}', which does not precede it",
                        phase.name, earlier
                    )));
                }
            }

            if !seen_phases.insert(phase.name.as_str()) {
                return Err(Error::plan_invalid(format!(
                    "duplicate phase name '{}'",
                    phase.name
                )));
            }

            let mut in_phase = HashSet::new();
            for agent_id in &phase.agent_ids {
                if !self.registry.contains(agent_id) {
                    return Err(Error::plan_invalid(format!(
                        "phase '{}' references unknown agent '{}'",
                        phase.name, agent_id
                    )));
                }
                if !in_phase.insert(agent_id.as_str()) {
                    return Err(Error::plan_invalid(format!(
                        "agent '{}' listed twice in phase '{}'",
                        agent_id, phase.name
                    )));
                }
            }
        }
        Ok(())
    }
}
