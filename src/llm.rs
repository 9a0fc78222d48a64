//! LLM client for the Anthropic Messages API.
//!
//! [`LlmClient`] is the seam the generator talks to. [`AnthropicClient`]
//! implements it over `reqwest`; tests substitute a scripted client.
//!
//! # Wire shape
//!
//! ```text
//! POST {base_url}/v1/messages
//! {
//!   "model": "...", "max_tokens": 800, "temperature": 0.0,
//!   "system": "...",
//!   "messages": [{ "role": "user", "content": [{ "type": "text", "text": "..." }] }],
//!   "tools": [{ "name": "...", "description": "...", "input_schema": {...} }],
//!   "tool_choice": { "type": "auto" }
//! }
//! ```
//!
//! Rate limits (429), overload (529) and other 5xx responses are retried
//! with the same backoff as the embedding providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Failure talking to the LLM API.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0} environment variable not set")]
    MissingApiKey(String),
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not model (e.g. `thinking`).
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// A tool declaration as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Everything the generator controls in a request. Model, token budget
/// and temperature belong to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

impl LlmResponse {
    /// Text of the first text block, or `""` when there is none.
    pub fn first_text(&self) -> String {
        self.content
            .iter()
            .find_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// `(id, name, input)` for each tool call, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) && self.tool_uses().next().is_some()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

// ============ Anthropic ============

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
}

impl AnthropicClient {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, request: &LlmRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
            body["tool_choice"] = serde_json::json!({ "type": "auto" });
        }
        body
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(request);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying LLM request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await?;
                        return serde_json::from_str(&text)
                            .map_err(|e| LlmError::InvalidResponse(e.to_string()));
                    }

                    let message = response.text().await.unwrap_or_default();
                    let err = LlmError::Api {
                        status: status.as_u16(),
                        message,
                    };
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(%status, "LLM API transient error");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "LLM connection error");
                    last_err = Some(LlmError::Http(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::InvalidResponse("no attempts made".to_string())))
    }
}
