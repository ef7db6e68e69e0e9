//! Agent registry with prerequisite declarations
//!
//! Each agent declares the agents whose results it needs. The registry is
//! built once and then only read: lookups and dependency checks have no
//! side effects and fail only on unknown identifiers.

use aeo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Catalog entry for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Stable agent identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What the agent produces, shown to the planning oracle
    pub description: String,
    /// Agents that must be completed before this one may run
    pub dependencies: Vec<String>,
}

impl AgentDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            dependencies: Vec::new(),
        }
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Builder: add prerequisite
    pub fn depends_on(mut self, agent_id: &str) -> Self {
        if !self.dependencies.iter().any(|d| d == agent_id) {
            self.dependencies.push(agent_id.to_string());
        }
        self
    }
}

/// Static catalog of agents
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard AEO audit agents
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for def in default_agents() {
            // Defaults are declared prerequisites-first
            if let Err(e) = registry.register(def) {
                tracing::error!(error = %e, "Invalid default agent definition");
            }
        }
        registry
    }

    /// Register an agent.
    ///
    /// Prerequisites must already be registered, which also rules out cycles.
    pub fn register(&mut self, definition: AgentDefinition) -> Result<()> {
        if definition.id.trim().is_empty() {
            return Err(Error::Config("agent id must not be empty".into()));
        }
        if self.agents.contains_key(&definition.id) {
            return Err(Error::Config(format!(
                "agent '{}' is already registered",
                definition.id
            )));
        }
        for dep in &definition.dependencies {
            if dep == &definition.id {
                return Err(Error::Config(format!("agent '{}' depends on itself", dep)));
            }
            if !self.agents.contains_key(dep) {
                return Err(Error::UnknownAgent(dep.clone()));
            }
        }

        debug!(
            agent_id = %definition.id,
            dependencies = ?definition.dependencies,
            "Registered agent"
        );
        self.agents.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_agent(mut self, definition: AgentDefinition) -> Result<Self> {
        self.register(definition)?;
        Ok(self)
    }

    pub fn get(&self, agent_id: &str) -> Result<&AgentDefinition> {
        self.agents
            .get(agent_id)
            .ok_or_else(|| Error::UnknownAgent(agent_id.to_string()))
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Declared prerequisites of an agent (empty for root agents)
    pub fn get_dependencies(&self, agent_id: &str) -> Result<HashSet<String>> {
        Ok(self.get(agent_id)?.dependencies.iter().cloned().collect())
    }

    /// True iff every prerequisite is in `completed`
    pub fn dependencies_satisfied(
        &self,
        agent_id: &str,
        completed: &HashSet<String>,
    ) -> Result<bool> {
        Ok(self.missing_dependencies(agent_id, completed)?.is_empty())
    }

    /// Prerequisites not yet in `completed`, in declaration order
    pub fn missing_dependencies(
        &self,
        agent_id: &str,
        completed: &HashSet<String>,
    ) -> Result<Vec<String>> {
        Ok(self
            .get(agent_id)?
            .dependencies
            .iter()
            .filter(|d| !completed.contains(*d))
            .cloned()
            .collect())
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    /// One line per agent: `id: description (requires: a, b)`
    pub fn catalog_text(&self) -> String {
        self.agents
            .values()
            .map(|def| {
                let requires = if def.dependencies.is_empty() {
                    "none".to_string()
                } else {
                    def.dependencies.join(", ")
                };
                format!("- {}: {} (requires: {})", def.id, def.description, requires)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn default_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::new("page-analysis", "Page Analysis")
            .with_description("Fetches the target page and extracts structure, metadata and text"),
        AgentDefinition::new("content-analysis", "Content Analysis")
            .with_description("Scores answerability, entity coverage and content readability")
            .depends_on("page-analysis"),
        AgentDefinition::new("technical-analysis", "Technical Analysis")
            .with_description("Checks structured data, robots rules and AI-crawler accessibility")
            .depends_on("page-analysis"),
        AgentDefinition::new("search-simulation", "Search Simulation")
            .with_description("Asks answer engines representative questions and records citations")
            .depends_on("content-analysis"),
        AgentDefinition::new("competitor-analysis", "Competitor Analysis")
            .with_description("Compares the domain with sources cited ahead of it")
            .depends_on("search-simulation"),
        AgentDefinition::new("visibility-scoring", "Visibility Scoring")
            .with_description("Combines content, technical and search signals into an AEO score")
            .depends_on("content-analysis")
            .depends_on("technical-analysis")
            .depends_on("search-simulation"),
        AgentDefinition::new("recommendations", "Recommendations")
            .with_description("Produces prioritized fixes from the score breakdown")
            .depends_on("visibility-scoring"),
    ]
}
