//! Oracles backed by a language model
//!
//! Each oracle prompts for a JSON reply and parses it into the pipeline's
//! contract types. Replies may arrive wrapped in Markdown code fences or
//! surrounded by prose; only the outermost JSON object is parsed.

use aeo_agents::AgentRegistry;
use aeo_core::{
    AgentContext, Error, ExecutionPlan, OracleSummary, PlanningOracle, Reasoning, Result,
    ResultReasoner, SummarizationOracle,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::provider::{ChatMessage, ChatRequest, LlmProvider};

const TRUNCATION_MARKER: &str = "...[truncated]";

const PLANNING_PROMPT: &str = "You plan Answer Engine Optimization analyses. \
Group the available agents into ordered phases. Agents in a parallel phase must not depend on each other, \
and every agent's prerequisites must complete in an earlier phase. Skip agents that already completed. \
Reply with JSON only: {\"phases\":[{\"name\":string,\"agentIds\":[string],\"runInParallel\":bool,\
\"dependsOnPhaseNames\":[string]}],\"estimatedDurationSeconds\":number,\"rationale\":string}";

const SUMMARY_PROMPT: &str = "You condense the output of an analysis agent. \
Reply with JSON only: {\"summary\":string,\"keyFindings\":[string],\"metrics\":{string:number},\
\"nextSteps\":[string],\"status\":\"completed\"|\"failed\"}. \
Use status \"failed\" only if the output shows the agent did not do its job.";

const BRIEF_PROMPT: &str = "Summarize the output of an analysis agent in at most two sentences. \
Reply with plain text only.";

const REASONING_PROMPT: &str = "You review the progress of an Answer Engine Optimization analysis after each phase. \
Decide whether further phases are worthwhile. \
Reply with JSON only: {\"insights\":[string],\"shouldContinue\":bool,\"nextSteps\":[string],\
\"adjustments\":[string]}. Leave adjustments empty unless the remaining plan must change.";

/// Shared model access for the oracles
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    max_result_chars: usize,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_result_chars: config.max_result_chars,
        }
    }

    async fn complete(&self, system: &str, prompt: String) -> Result<String> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_system(system)
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.2);

        let response = self
            .provider
            .chat(&self.model, request)
            .await
            .map_err(|e| {
                Error::oracle_call(format!("{} request failed: {:#}", self.provider.name(), e))
            })?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = %response.provider,
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "LLM call finished"
            );
        }
        Ok(response.content)
    }

    fn render_result(&self, full_result: &Value) -> String {
        truncate_result(full_result, self.max_result_chars)
    }
}

/// Outermost JSON object in `text`, with any Markdown fence removed
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
            rest.rsplit_once("```").map_or(rest, |(inner, _)| inner)
        }
        None => trimmed,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

fn parse_reply<T: DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
    let json = extract_json(text).ok_or_else(|| "reply contains no JSON object".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Compact JSON of `value`, cut to at most `max_chars` characters plus a marker
pub fn truncate_result(value: &Value, max_chars: usize) -> String {
    let text = value.to_string();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text,
    }
}

/// Planning oracle that asks the model to arrange catalog agents into phases
pub struct LlmPlanningOracle {
    llm: Arc<LlmClient>,
    catalog: String,
}

impl LlmPlanningOracle {
    /// `catalog` lists the agents the model may choose from, one per line
    pub fn new(llm: Arc<LlmClient>, catalog: impl Into<String>) -> Self {
        Self {
            llm,
            catalog: catalog.into(),
        }
    }

    /// Offer every agent in `registry` with its prerequisites
    pub fn from_registry(llm: Arc<LlmClient>, registry: &AgentRegistry) -> Self {
        Self::new(llm, registry.catalog_text())
    }
}

#[async_trait]
impl PlanningOracle for LlmPlanningOracle {
    async fn propose(
        &self,
        target_url: &str,
        domain: &str,
        context_digest: &str,
    ) -> Result<ExecutionPlan> {
        let prompt = format!(
            "Target URL: {}\nDomain: {}\n\nAvailable agents:\n{}\n\nCurrent progress:\n{}",
            target_url, domain, self.catalog, context_digest
        );
        let reply = self.llm.complete(PLANNING_PROMPT, prompt).await?;
        parse_reply(&reply).map_err(|e| {
            warn!(error = %e, "Planning reply rejected");
            Error::plan_invalid(format!("unparseable plan: {}", e))
        })
    }
}

pub struct LlmSummarizationOracle {
    llm: Arc<LlmClient>,
}

impl LlmSummarizationOracle {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SummarizationOracle for LlmSummarizationOracle {
    async fn summarize(&self, agent_id: &str, full_result: &Value) -> Result<OracleSummary> {
        let prompt = format!(
            "Agent: {}\nOutput:\n{}",
            agent_id,
            self.llm.render_result(full_result)
        );
        let reply = self.llm.complete(SUMMARY_PROMPT, prompt).await?;
        parse_reply(&reply)
            .map_err(|e| Error::oracle_call(format!("unparseable summary for {}: {}", agent_id, e)))
    }

    async fn brief_summarize(&self, agent_id: &str, full_result: &Value) -> Result<String> {
        let prompt = format!(
            "Agent: {}\nOutput:\n{}",
            agent_id,
            self.llm.render_result(full_result)
        );
        let reply = self.llm.complete(BRIEF_PROMPT, prompt).await?;
        let brief = reply.trim();
        if brief.is_empty() {
            return Err(Error::oracle_call(format!("empty brief summary for {}", agent_id)));
        }
        Ok(brief.to_string())
    }
}

pub struct LlmResultReasoner {
    llm: Arc<LlmClient>,
}

impl LlmResultReasoner {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ResultReasoner for LlmResultReasoner {
    async fn reason(&self, context: &AgentContext) -> Result<Reasoning> {
        let prompt = format!(
            "Domain: {}\nAgent summaries:\n{}",
            context.domain,
            serde_json::to_string_pretty(&context.summaries)?
        );
        let reply = self.llm.complete(REASONING_PROMPT, prompt).await?;
        parse_reply(&reply).map_err(|e| Error::oracle_call(format!("unparseable reasoning: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatResponse;
    use aeo_agents::AgentRegistry;
use aeo_core::{AgentStatus, AgentSummary};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records prompts
    #[derive(Default)]
    struct MockProvider {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn replying(replies: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn chat(&self, model: &str, request: ChatRequest) -> anyhow::Result<ChatResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no reply scripted")))?;
            Ok(ChatResponse {
                content,
                model: model.to_string(),
                provider: "mock".to_string(),
                finish_reason: None,
                usage: None,
            })
        }
    }

    fn client(provider: Arc<MockProvider>) -> Arc<LlmClient> {
        Arc::new(LlmClient::new(provider, &LlmConfig::default()))
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some(r#"{"a":1}"#));
        assert_eq!(
            extract_json("Here is the plan:\n{\"a\":{\"b\":2}}\nDone."),
            Some(r#"{"a":{"b":2}}"#)
        );
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_truncate_result() {
        let value = json!({"text": "é".repeat(50)});
        let cut = truncate_result(&value, 10);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), 10 + TRUNCATION_MARKER.chars().count());

        let small = json!({"a": 1});
        assert_eq!(truncate_result(&small, 100), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_planning_parses_fenced_plan() {
        let reply = r#"```json
{"phases":[
  {"name":"Discovery","agentIds":["page-analysis"],"runInParallel":false},
  {"name":"Analysis","agentIds":["content-analysis","technical-analysis"],"runInParallel":true,"dependsOnPhaseNames":["Discovery"]}
],"estimatedDurationSeconds":90,"rationale":"page first"}
```"#;
        let provider = MockProvider::replying(vec![Ok(reply.to_string())]);
        let oracle = LlmPlanningOracle::new(client(provider.clone()), "- page-analysis: fetch");

        let plan = oracle
            .propose("https://example.com", "example.com", "Completed agents:\n(none)")
            .await
            .unwrap();
        assert_eq!(plan.phase_names(), vec!["Discovery", "Analysis"]);
        assert!(plan.phases[1].run_in_parallel);
        assert_eq!(plan.estimated_duration_seconds, 90);

        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("- page-analysis: fetch"));
        assert!(prompt.contains("Target URL: https://example.com"));
    }

    #[tokio::test]
    async fn test_planning_prompt_lists_registry_catalog() {
        let reply = r#"{"phases":[{"name":"Discovery","agentIds":["page-analysis"]}]}"#;
        let provider = MockProvider::replying(vec![Ok(reply.to_string())]);
        let registry = AgentRegistry::with_defaults();
        let oracle = LlmPlanningOracle::from_registry(client(provider.clone()), &registry);

        oracle.propose("https://example.com", "example.com", "").await.unwrap();
        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("- page-analysis: Fetches the target page"));
        assert!(prompt.contains(
            "- recommendations: Produces prioritized fixes from the score breakdown \
             (requires: visibility-scoring)"
        ));
    }

    #[tokio::test]
    async fn test_malformed_plan_is_plan_invalid() {
        let provider = MockProvider::replying(vec![Ok(r#"{"phases":"soon"}"#.to_string())]);
        let oracle = LlmPlanningOracle::new(client(provider), "");
        let err = oracle.propose("u", "d", "").await.unwrap_err();
        assert!(matches!(err, Error::OraclePlanInvalid(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_oracle_call_failed() {
        let provider = MockProvider::replying(vec![Err(anyhow::anyhow!("connection reset"))]);
        let oracle = LlmPlanningOracle::new(client(provider), "");
        let err = oracle.propose("u", "d", "").await.unwrap_err();
        assert!(matches!(err, Error::OracleCallFailed(ref m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_summarize() {
        let reply = r#"{"summary":"FAQ schema missing","keyFindings":["no FAQPage markup"],
            "metrics":{"schemaCoverage":0.2},"status":"completed"}"#;
        let provider = MockProvider::replying(vec![
            Ok(reply.to_string()),
            Ok("not json".to_string()),
            Ok("  Schema coverage is low.  ".to_string()),
        ]);
        let oracle = LlmSummarizationOracle::new(client(provider));
        let full = json!({"schemas": []});

        let summary = oracle.summarize("technical-analysis", &full).await.unwrap();
        assert_eq!(summary.summary, "FAQ schema missing");
        assert_eq!(summary.metrics["schemaCoverage"], 0.2);
        assert_eq!(summary.status, Some(AgentStatus::Completed));

        let err = oracle.summarize("technical-analysis", &full).await.unwrap_err();
        assert!(matches!(err, Error::OracleCallFailed(_)));

        let brief = oracle.brief_summarize("technical-analysis", &full).await.unwrap();
        assert_eq!(brief, "Schema coverage is low.");
    }

    #[tokio::test]
    async fn test_reasoner() {
        let reply = r#"Verdict:
{"insights":["competitors cited 3x more"],"shouldContinue":false,"nextSteps":["add FAQ"]}"#;
        let provider = MockProvider::replying(vec![Ok(reply.to_string())]);
        let reasoner = LlmResultReasoner::new(client(provider.clone()));

        let mut ctx = AgentContext::new("job", "tenant", "example.com");
        ctx.summaries
            .insert("page-analysis".into(), AgentSummary::failed("page-analysis", "403"));

        let reasoning = reasoner.reason(&ctx).await.unwrap();
        assert!(!reasoning.should_continue);
        assert_eq!(reasoning.next_steps, Some(vec!["add FAQ".to_string()]));
        assert!(!reasoning.wants_replan());
        assert!(provider.prompts.lock().unwrap()[0].contains("Agent failed: 403"));
    }
}
