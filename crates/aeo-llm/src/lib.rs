//! aeo-llm: Language-model oracles for the AEO pipeline
//!
//! ## Environment Variables
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-xxx          # Anthropic Claude
//! AEO_LLM_MODEL=claude-sonnet-4-20250514
//! AEO_LLM_BASE_URL=https://api.anthropic.com/v1
//! AEO_LLM_MAX_TOKENS=4096
//! ```

pub mod anthropic;
pub mod config;
pub mod oracles;
pub mod provider;

pub use anthropic::AnthropicClient;
pub use config::LlmConfig;
pub use oracles::{LlmClient, LlmPlanningOracle, LlmResultReasoner, LlmSummarizationOracle};
pub use provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, TokenUsage};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::anthropic::AnthropicClient;
    pub use super::config::LlmConfig;
    pub use super::oracles::{
        LlmClient, LlmPlanningOracle, LlmResultReasoner, LlmSummarizationOracle,
    };
    pub use super::provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider};
}
