//! Anthropic Claude API Client
//!
//! ## API Endpoints
//!
//! | Endpoint | URL | Purpose |
//! |----------|-----|--------|
//! | Base URL | `https://api.anthropic.com/v1` | All Claude APIs |
//! | Messages | `/messages` | Chat completions |
//!
//! ## Authentication
//! - Header: `x-api-key: {ANTHROPIC_API_KEY}`
//! - Header: `anthropic-version: 2023-06-01`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, TokenUsage};

pub mod endpoints {
    pub const BASE_URL: &str = "https://api.anthropic.com/v1";
    pub const MESSAGES: &str = "/messages";
    pub const API_VERSION: &str = "2023-06-01";
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, endpoints::BASE_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_url: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        Ok(Self::with_endpoint(api_key, &config.base_url))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, model: &str, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}{}", self.api_url, endpoints::MESSAGES);
        let api_request = AnthropicRequest {
            model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(4096),
            system: request.system.as_deref(),
            temperature: request.temperature,
        };

        debug!(url = %url, model, messages = request.messages.len(), "Anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", endpoints::API_VERSION)
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await
            .context("Failed to send Anthropic request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Anthropic API error {}: {}", status, body));
        }

        let result: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let text: String = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .collect();

        let usage = result.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(ChatResponse {
            content: text,
            model: result.model,
            provider: "anthropic".to_string(),
            finish_reason: result.stop_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("plan this")];
        let request = AnthropicRequest {
            model: "claude-sonnet-4-20250514",
            messages: &messages,
            max_tokens: 1024,
            system: Some("You plan agent runs"),
            temperature: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["system"], "You plan agent runs");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_response_ignores_non_text_blocks() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "1}"}
            ],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 3);
        assert!(matches!(parsed.content[1], ResponseContentBlock::Other));
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let client = AnthropicClient::with_endpoint("key", "http://localhost:8080/v1/");
        assert_eq!(client.api_url(), "http://localhost:8080/v1");
    }
}
