//! LLM client — the single point of entry for all model calls in this crate.
//!
//! Wraps the Anthropic Messages API with tool-use support. Failure policy,
//! owned by the intake flow rather than this transport:
//! - HTTP 429 surfaces as `AppError::QuotaExceeded` so the caller can show a
//!   specific message. Never retried here.
//! - 5xx and transport errors retry with exponential backoff, then degrade.
//! - Everything else degrades into an error-flagged empty `ModelOutcome`, so
//!   the conversational flow continues instead of raising mid-chat.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod tools;

use crate::errors::AppError;
use crate::models::chat::{ChatMessage, MessageRole, ToolInvocation};
use tools::ToolSchema;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What one model call produced: assistant text and/or tool invocations.
/// `degraded` marks an outcome substituted for a non-quota failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub degraded: bool,
    pub error: Option<String>,
}

impl ModelOutcome {
    pub fn degraded(error: impl Into<String>) -> Self {
        ModelOutcome {
            text: String::new(),
            tool_calls: Vec::new(),
            degraded: true,
            error: Some(error.into()),
        }
    }

    /// The assistant message to persist for this outcome.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: MessageRole::Assistant,
            content: self.text.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_results: Vec::new(),
        }
    }
}

/// The model seam. `LlmClient` is the production implementation; tests use
/// scripted fakes. Carried in `AppState` as `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one chat turn. `Err` is reserved for `QuotaExceeded`; all other
    /// failures must come back as a degraded `Ok` outcome.
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelOutcome, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Flattens a `ChatMessage` into Anthropic content blocks, preserving text,
/// tool invocations and tool results.
fn to_wire(message: &ChatMessage) -> WireMessage {
    let mut content = Vec::new();
    for result in &message.tool_results {
        content.push(serde_json::json!({
            "type": "tool_result",
            "tool_use_id": result.call_id,
            "content": result.content,
        }));
    }
    if !message.content.is_empty() {
        content.push(serde_json::json!({"type": "text", "text": message.content}));
    }
    for call in &message.tool_calls {
        content.push(serde_json::json!({
            "type": "tool_use",
            "id": call.call_id,
            "name": call.name,
            "input": call.arguments,
        }));
    }
    WireMessage {
        role: match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        },
        content,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes a raw call. Retries 5xx and transport errors with exponential
    /// backoff; 429 returns `LlmError::RateLimited` immediately.
    async fn call(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<WireResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: messages.iter().map(to_wire).collect(),
            tools: tools
                .iter()
                .map(|t| serde_json::to_value(t))
                .collect::<Result<_, _>>()?,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited);
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let wire: WireResponse = response.json().await.map_err(LlmError::Http)?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                wire.usage.input_tokens, wire.usage.output_tokens
            );

            return Ok(wire);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited))
    }
}

fn outcome_from_wire(wire: WireResponse) -> ModelOutcome {
    let mut outcome = ModelOutcome::default();
    for block in wire.content {
        match block.block_type.as_str() {
            "text" => {
                if let Some(text) = block.text {
                    if !outcome.text.is_empty() {
                        outcome.text.push('\n');
                    }
                    outcome.text.push_str(&text);
                }
            }
            "tool_use" => {
                if let (Some(id), Some(name)) = (block.id, block.name) {
                    outcome.tool_calls.push(ToolInvocation {
                        call_id: id,
                        name,
                        arguments: block.input.unwrap_or(serde_json::Value::Null),
                    });
                }
            }
            other => debug!("Ignoring model content block of type {other}"),
        }
    }
    outcome
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelOutcome, AppError> {
        match self.call(system, messages, tools).await {
            Ok(wire) => Ok(outcome_from_wire(wire)),
            Err(LlmError::RateLimited) => Err(AppError::QuotaExceeded),
            Err(e) => {
                warn!("Model call degraded: {e}");
                Ok(ModelOutcome::degraded(e.to_string()))
            }
        }
    }
}
