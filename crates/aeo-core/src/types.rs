//! Data model shared by the registry, context store, executor and orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::Deserializer;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Lifecycle of one agent within one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    /// Completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "pending"),
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Reference to a full agent result in blob storage.
///
/// Keys are namespaced `tenant_id/job_id/agent_id`. `%` and `/` inside a
/// segment are percent-encoded, so distinct triples never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(tenant_id: &str, job_id: &str, agent_id: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            escape_segment(tenant_id),
            escape_segment(job_id),
            escape_segment(agent_id)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains(['%', '/']) {
        Cow::Owned(segment.replace('%', "%25").replace('/', "%2F"))
    } else {
        Cow::Borrowed(segment)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight, in-memory view of one agent's outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: String,
    pub status: AgentStatus,
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Present only when `status` is completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<BlobRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
}

impl AgentSummary {
    /// Summary for an agent that has just been started
    pub fn running(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Running,
            summary: String::new(),
            key_findings: Vec::new(),
            metrics: BTreeMap::new(),
            artifact_ref: None,
            completed_at: None,
            next_steps: None,
        }
    }

    /// Summary for an agent whose work function raised
    pub fn failed(agent_id: &str, error: &str) -> Self {
        Self {
            status: AgentStatus::Failed,
            summary: format!("Agent failed: {}", error),
            ..Self::running(agent_id)
        }
    }

    /// First line of the summary text, for compact digests
    pub fn headline(&self) -> &str {
        self.summary.lines().next().unwrap_or("").trim()
    }
}

/// Per-job working context owned by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub job_id: String,
    pub tenant_id: String,
    pub domain: String,
    pub summaries: BTreeMap<String, AgentSummary>,
    /// Denormalized from `summaries` for fast lookup
    pub artifact_refs: BTreeMap<String, BlobRef>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub token_estimate: usize,
}

impl AgentContext {
    pub fn new(job_id: &str, tenant_id: &str, domain: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            tenant_id: tenant_id.to_string(),
            domain: domain.to_string(),
            summaries: BTreeMap::new(),
            artifact_refs: BTreeMap::new(),
            created_at: now,
            last_updated: now,
            token_estimate: 0,
        }
    }

    /// Agent ids whose summary is completed
    pub fn completed_ids(&self) -> HashSet<String> {
        self.ids_with_status(AgentStatus::Completed)
            .into_iter()
            .collect()
    }

    /// Agent ids with the given status, in id order
    pub fn ids_with_status(&self, status: AgentStatus) -> BTreeSet<String> {
        self.summaries
            .values()
            .filter(|s| s.status == status)
            .map(|s| s.agent_id.clone())
            .collect()
    }

    pub fn status_of(&self, agent_id: &str) -> Option<AgentStatus> {
        self.summaries.get(agent_id).map(|s| s.status)
    }

    /// Recompute `token_estimate` from the current summaries and bump `last_updated`
    pub fn touch(&mut self) {
        self.token_estimate = estimate_tokens(&self.summaries);
        self.last_updated = Utc::now();
    }
}

/// Approximate token count of a summary map: `ceil(serialized_bytes / 4)`.
///
/// Always computed over the whole map so repeated calls cannot drift.
pub fn estimate_tokens(summaries: &BTreeMap<String, AgentSummary>) -> usize {
    let bytes = serde_json::to_vec(summaries).map(|b| b.len()).unwrap_or(0);
    bytes.div_ceil(4)
}

/// One named group of agents in an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPhase {
    pub name: String,
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub run_in_parallel: bool,
    #[serde(default)]
    pub depends_on_phase_names: Vec<String>,
}

impl ExecutionPhase {
    /// Phase whose agents run strictly in declaration order
    pub fn sequential(name: &str, agent_ids: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            agent_ids: agent_ids.iter().map(|s| s.to_string()).collect(),
            run_in_parallel: false,
            depends_on_phase_names: Vec::new(),
        }
    }

    /// Phase whose agents are launched concurrently
    pub fn parallel(name: &str, agent_ids: &[&str]) -> Self {
        Self {
            run_in_parallel: true,
            ..Self::sequential(name, agent_ids)
        }
    }

    /// Builder: declare a prerequisite phase
    pub fn after(mut self, phase_name: &str) -> Self {
        self.depends_on_phase_names.push(phase_name.to_string());
        self
    }
}

/// Ordered phases for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub phases: Vec<ExecutionPhase>,
    #[serde(default)]
    pub estimated_duration_seconds: u64,
    /// Free text, for observability only
    #[serde(default)]
    pub rationale: String,
}

impl ExecutionPlan {
    pub fn new(phases: Vec<ExecutionPhase>) -> Self {
        Self {
            phases,
            estimated_duration_seconds: 0,
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: &str) -> Self {
        self.rationale = rationale.to_string();
        self
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// Structured output of the Summarization Oracle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleSummary {
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    /// Only `failed` is honoured; anything else is stored as completed
    #[serde(default, deserialize_with = "failed_only")]
    pub status: Option<AgentStatus>,
}

fn failed_only<'de, D>(deserializer: D) -> std::result::Result<Option<AgentStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| s.trim().eq_ignore_ascii_case("failed"))
        .map(|_| AgentStatus::Failed))
}

/// Output of the Result Reasoner after each phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    #[serde(default)]
    pub insights: Vec<String>,
    pub should_continue: bool,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    #[serde(default)]
    pub adjustments: Option<Vec<String>>,
}

impl Reasoning {
    pub fn proceed() -> Self {
        Self {
            should_continue: true,
            ..Default::default()
        }
    }

    pub fn halt() -> Self {
        Self::default()
    }

    /// Whether the reasoner asked for a new plan
    pub fn wants_replan(&self) -> bool {
        self.adjustments.as_ref().is_some_and(|a| !a.is_empty())
    }
}
