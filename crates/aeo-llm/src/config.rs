//! LLM oracle settings

use aeo_core::config::{get_config, get_config_int, get_config_opt};

use crate::anthropic::endpoints;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Settings shared by the LLM-backed oracles
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    /// Serialized full results longer than this are cut before prompting
    pub max_result_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: endpoints::BASE_URL.to_string(),
            max_tokens: 4096,
            max_result_chars: 24_000,
        }
    }
}

impl LlmConfig {
    /// Read `ANTHROPIC_API_KEY`, `AEO_LLM_MODEL`, `AEO_LLM_BASE_URL`,
    /// `AEO_LLM_MAX_TOKENS` and `AEO_LLM_MAX_RESULT_CHARS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: get_config_opt("ANTHROPIC_API_KEY"),
            model: get_config("AEO_LLM_MODEL", &defaults.model),
            base_url: get_config("AEO_LLM_BASE_URL", &defaults.base_url),
            max_tokens: u32::try_from(get_config_int(
                "AEO_LLM_MAX_TOKENS",
                defaults.max_tokens as i64,
            ))
            .unwrap_or(defaults.max_tokens),
            max_result_chars: usize::try_from(get_config_int(
                "AEO_LLM_MAX_RESULT_CHARS",
                defaults.max_result_chars as i64,
            ))
            .unwrap_or(defaults.max_result_chars),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}
