//! Context Store - per-job working memory
//!
//! Holds one lightweight summary per agent plus a reference to the full
//! result in blob storage. All mutations recompute the token estimate over
//! the whole summary map.

use aeo_core::{
    AgentContext, AgentStatus, AgentSummary, BlobStore, Result, SummarizationOracle,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::compression::CompressionPolicy;
use crate::events::EventBus;

/// Fraction of the token budget at which the context counts as near its limit
pub const DEFAULT_APPROACH_RATIO: f64 = 0.8;

/// Identity and target of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScope {
    pub job_id: String,
    pub tenant_id: String,
    pub target_url: String,
    pub domain: String,
}

impl JobScope {
    pub fn new(job_id: &str, tenant_id: &str, target_url: &str, domain: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            tenant_id: tenant_id.to_string(),
            target_url: target_url.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// Per-job store of agent summaries backed by a blob store
pub struct ContextStore {
    scope: JobScope,
    context: RwLock<AgentContext>,
    blobs: Arc<dyn BlobStore>,
    summarizer: Arc<dyn SummarizationOracle>,
    approach_ratio: f64,
    events: EventBus,
}

impl ContextStore {
    pub fn new(
        scope: JobScope,
        blobs: Arc<dyn BlobStore>,
        summarizer: Arc<dyn SummarizationOracle>,
    ) -> Self {
        let mut context = AgentContext::new(&scope.job_id, &scope.tenant_id, &scope.domain);
        context.touch();
        Self {
            scope,
            context: RwLock::new(context),
            blobs,
            summarizer,
            approach_ratio: DEFAULT_APPROACH_RATIO,
            events: EventBus::default(),
        }
    }

    /// Builder: override the near-limit ratio
    pub fn with_approach_ratio(mut self, ratio: f64) -> Self {
        self.approach_ratio = ratio;
        self
    }

    /// Builder: publish agent events on a shared bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn scope(&self) -> &JobScope {
        &self.scope
    }

    pub fn job_id(&self) -> &str {
        &self.scope.job_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create a running summary, or flip an existing one back to running.
    ///
    /// A re-run drops the previous artifact reference until the agent
    /// completes again.
    pub async fn mark_running(&self, agent_id: &str) {
        let mut ctx = self.context.write().await;
        match ctx.summaries.get_mut(agent_id) {
            Some(summary) => {
                summary.status = AgentStatus::Running;
                summary.artifact_ref = None;
            }
            None => {
                ctx.summaries
                    .insert(agent_id.to_string(), AgentSummary::running(agent_id));
            }
        }
        ctx.artifact_refs.remove(agent_id);
        ctx.touch();
        debug!(job_id = %self.scope.job_id, agent_id, "Agent marked running");
    }

    /// Persist a successful agent's full result and record its summary.
    ///
    /// The summary is completed unless the summarization oracle reports the
    /// result as failed, in which case no artifact reference is recorded.
    pub async fn store_result(&self, agent_id: &str, full_result: Value) -> Result<AgentSummary> {
        let key = self
            .blobs
            .put(&self.scope.tenant_id, &self.scope.job_id, agent_id, &full_result)
            .await?;
        let oracle = self.summarizer.summarize(agent_id, &full_result).await?;

        let failed = oracle.status == Some(AgentStatus::Failed);
        let summary = AgentSummary {
            agent_id: agent_id.to_string(),
            status: if failed {
                AgentStatus::Failed
            } else {
                AgentStatus::Completed
            },
            summary: oracle.summary,
            key_findings: oracle.key_findings,
            metrics: oracle.metrics,
            artifact_ref: (!failed).then(|| key.clone()),
            completed_at: (!failed).then(Utc::now),
            next_steps: oracle.next_steps,
        };

        let mut ctx = self.context.write().await;
        if failed {
            ctx.artifact_refs.remove(agent_id);
        } else {
            ctx.artifact_refs.insert(agent_id.to_string(), key);
        }
        ctx.summaries.insert(agent_id.to_string(), summary.clone());
        ctx.touch();

        debug!(
            job_id = %self.scope.job_id,
            agent_id,
            status = %summary.status,
            token_estimate = ctx.token_estimate,
            "Stored agent result"
        );
        Ok(summary)
    }

    /// Record a failure; nothing is written to blob storage
    pub async fn mark_failed(&self, agent_id: &str, error: &str) {
        let mut ctx = self.context.write().await;
        ctx.summaries
            .insert(agent_id.to_string(), AgentSummary::failed(agent_id, error));
        ctx.artifact_refs.remove(agent_id);
        ctx.touch();
        warn!(job_id = %self.scope.job_id, agent_id, error, "Agent marked failed");
    }

    pub async fn get_summary(&self, agent_id: &str) -> Option<AgentSummary> {
        self.context.read().await.summaries.get(agent_id).cloned()
    }

    pub async fn get_all_summaries(&self) -> BTreeMap<String, AgentSummary> {
        self.context.read().await.summaries.clone()
    }

    /// Read the full result through to blob storage on every call.
    ///
    /// Only completed agents have a retrievable result.
    pub async fn get_full_result(&self, agent_id: &str) -> Result<Option<Value>> {
        if !self.context.read().await.artifact_refs.contains_key(agent_id) {
            return Ok(None);
        }
        self.blobs
            .get(&self.scope.tenant_id, &self.scope.job_id, agent_id)
            .await
    }

    pub async fn completed_ids(&self) -> HashSet<String> {
        self.context.read().await.completed_ids()
    }

    pub async fn status_of(&self, agent_id: &str) -> Option<AgentStatus> {
        self.context.read().await.status_of(agent_id)
    }

    pub async fn token_estimate(&self) -> usize {
        self.context.read().await.token_estimate
    }

    /// Copy of the whole context
    pub async fn snapshot(&self) -> AgentContext {
        self.context.read().await.clone()
    }

    /// True when the token estimate exceeds the near-limit share of `limit_tokens`
    pub async fn is_approaching_limit(&self, limit_tokens: usize) -> bool {
        let estimate = self.token_estimate().await;
        estimate as f64 > self.approach_ratio * limit_tokens as f64
    }

    /// Shorten the summaries chosen by `policy` using brief oracle summaries.
    ///
    /// Summaries whose full result or brief summary cannot be obtained are
    /// left as they are. Returns the number rewritten.
    pub async fn compress(
        &self,
        oracle: &dyn SummarizationOracle,
        policy: &dyn CompressionPolicy,
    ) -> Result<usize> {
        let targets = policy.select(&*self.context.read().await);
        if targets.is_empty() {
            debug!(job_id = %self.scope.job_id, "Nothing to compress");
            return Ok(0);
        }

        let mut rewrites = Vec::with_capacity(targets.len());
        for agent_id in targets {
            let full = match self.get_full_result(&agent_id).await {
                Ok(Some(full)) => full,
                Ok(None) => {
                    warn!(
                        job_id = %self.scope.job_id,
                        agent_id = %agent_id,
                        "Artifact missing, skipping compression"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        job_id = %self.scope.job_id,
                        agent_id = %agent_id,
                        error = %e,
                        "Artifact read failed, skipping compression"
                    );
                    continue;
                }
            };
            match oracle.brief_summarize(&agent_id, &full).await {
                Ok(brief) => rewrites.push((agent_id, brief)),
                Err(e) => {
                    warn!(
                        job_id = %self.scope.job_id,
                        agent_id = %agent_id,
                        error = %e,
                        "Brief summary failed, skipping compression"
                    );
                }
            }
        }

        let max_findings = policy.max_key_findings();
        let mut ctx = self.context.write().await;
        let before = ctx.token_estimate;
        let mut rewritten = 0;
        for (agent_id, brief) in rewrites {
            if let Some(summary) = ctx.summaries.get_mut(&agent_id) {
                // The agent may have been re-run while the oracle was busy
                if summary.status != AgentStatus::Completed {
                    continue;
                }
                summary.summary = brief;
                summary.key_findings.truncate(max_findings);
                rewritten += 1;
            }
        }
        ctx.touch();

        info!(
            job_id = %self.scope.job_id,
            rewritten,
            tokens_before = before,
            tokens_after = ctx.token_estimate,
            "Compressed context"
        );
        Ok(rewritten)
    }

    /// Compress with the store's own summarization oracle
    pub async fn compress_with(&self, policy: &dyn CompressionPolicy) -> Result<usize> {
        let oracle = Arc::clone(&self.summarizer);
        self.compress(oracle.as_ref(), policy).await
    }
}
