//! Chat-completion client and the adapter every agent step talks through.
//!
//! The provider speaks the OpenAI-compatible `/chat/completions` dialect
//! (Cerebras Cloud, OpenRouter, OpenAI itself). [`LlmAdapter`] normalizes
//! roles, fills in default sampling options and decides what a failed call
//! looks like to its caller: [`LlmAdapter::try_send`] reports the error,
//! [`LlmAdapter::send`] logs it and hands back an empty string.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Roles the provider accepts verbatim. Everything else is sent as `user`.
const KNOWN_ROLES: [&str; 3] = ["system", "user", "assistant"];

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Map a role name onto the provider's fixed set.
///
/// `human` (and any other unknown role) becomes `user`.
pub fn normalize_role(role: &str) -> &'static str {
    let lower = role.trim().to_ascii_lowercase();
    KNOWN_ROLES
        .iter()
        .find(|known| **known == lower)
        .copied()
        .unwrap_or("user")
}

/// Per-call sampling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            stop: None,
        }
    }
}

/// Reasoning effort hint understood by reasoning models (`gpt-oss-120b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasoningEffort::Low => write!(f, "low"),
            ReasoningEffort::Medium => write!(f, "medium"),
            ReasoningEffort::High => write!(f, "high"),
        }
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("unknown reasoning effort '{other}' (expected low, medium or high)")),
        }
    }
}

/// Fully resolved request body, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    pub stream: bool,
}

/// Why a completion produced no usable text.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no messages to send")]
    EmptyMessages,
    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Decode(String),
    #[error("provider response contained no choices")]
    NoChoices,
    #[error("provider returned empty content")]
    EmptyContent,
}

/// Something that can turn a [`ChatRequest`] into text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Rebuild the underlying HTTP client with a whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let parsed: CompletionResponse =
            serde_json::from_slice(&bytes).map_err(|e| LlmError::Decode(e.to_string()))?;
        first_choice_text(parsed)
    }
}

fn first_choice_text(resp: CompletionResponse) -> Result<String, LlmError> {
    let choice = resp.choices.into_iter().next().ok_or(LlmError::NoChoices)?;
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::EmptyContent),
    }
}

/// The single entry point agents use to reach the model.
///
/// Cheap to clone; the backend (and its connection pool) is shared.
#[derive(Clone)]
pub struct LlmAdapter {
    backend: Arc<dyn ChatBackend>,
    model: String,
    defaults: CallOptions,
    reasoning_effort: Option<ReasoningEffort>,
}

impl LlmAdapter {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            defaults: CallOptions::default(),
            reasoning_effort: None,
        }
    }

    pub fn with_defaults(mut self, defaults: CallOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_reasoning_effort(mut self, effort: Option<ReasoningEffort>) -> Self {
        self.reasoning_effort = effort;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn defaults(&self) -> &CallOptions {
        &self.defaults
    }

    /// Validate the messages and build the wire request.
    pub fn build_request(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<ChatRequest, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::EmptyMessages);
        }
        let messages = messages
            .iter()
            .map(|m| Message::new(normalize_role(&m.role), m.content.clone()))
            .collect();
        Ok(ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_completion_tokens: options.max_tokens,
            stop: options.stop.clone().filter(|s| !s.is_empty()),
            reasoning_effort: self.reasoning_effort,
            stream: false,
        })
    }

    /// Send a conversation and report any failure to the caller.
    pub async fn try_send(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<String, LlmError> {
        let request = self.build_request(messages, options)?;
        tracing::info!(model = %self.model, messages = request.messages.len(), "LLM call");
        self.backend.complete(&request).await
    }

    /// Send a conversation; any failure is logged and becomes `""`.
    ///
    /// Callers must treat an empty string as "no usable result".
    pub async fn send(&self, messages: &[Message], options: &CallOptions) -> String {
        match self.try_send(messages, options).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "LLM call failed, returning empty response");
                String::new()
            }
        }
    }
}
