//! Context compression policies
//!
//! A policy only chooses which summaries to rewrite; the context store
//! performs the rewrite. Alternative strategies (LRU, priority by findings)
//! plug in without touching the orchestrator.

use aeo_core::{AgentContext, AgentStatus, OrchestratorConfig};

/// Chooses summaries to shorten when the context nears its token budget
pub trait CompressionPolicy: Send + Sync {
    /// Agent ids to rewrite. Only completed summaries with a stored
    /// artifact are eligible, since the rewrite re-reads the full result.
    fn select(&self, context: &AgentContext) -> Vec<String>;

    /// Key findings kept on a rewritten summary
    fn max_key_findings(&self) -> usize {
        2
    }
}

/// Rewrites the oldest share of completed summaries
#[derive(Debug, Clone, PartialEq)]
pub struct OldestFractionPolicy {
    pub fraction: f64,
    pub min_completed: usize,
}

impl Default for OldestFractionPolicy {
    fn default() -> Self {
        Self {
            fraction: 0.3,
            min_completed: 6,
        }
    }
}

impl OldestFractionPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            fraction: config.compression_fraction,
            min_completed: config.compression_min_completed,
        }
    }
}

impl CompressionPolicy for OldestFractionPolicy {
    fn select(&self, context: &AgentContext) -> Vec<String> {
        let mut eligible: Vec<_> = context
            .summaries
            .values()
            .filter(|s| s.status == AgentStatus::Completed)
            .filter(|s| context.artifact_refs.contains_key(&s.agent_id))
            .collect();

        if eligible.len() < self.min_completed {
            return Vec::new();
        }

        eligible.sort_by(|a, b| {
            a.completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });

        let count = (eligible.len() as f64 * self.fraction).floor() as usize;
        eligible
            .into_iter()
            .take(count)
            .map(|s| s.agent_id.clone())
            .collect()
    }
}
