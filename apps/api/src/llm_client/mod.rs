/// LLM Client — the single point of entry for text-generation provider calls.
///
/// ARCHITECTURAL RULE: no other module talks to a chat-completions endpoint directly.
/// Everything else depends on the `GenerationProvider` trait, so tests swap in stubs.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

/// Only 429 responses are retried here; every other failure goes straight to the caller.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Generation provider failure. Propagates immediately; the retry controller never
/// retries these, only validation failures.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("generation provider timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl GenerationError {
    pub fn is_timeout(&self) -> bool {
        match self {
            GenerationError::Timeout { .. } => true,
            GenerationError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// One prompt sent to a generation provider.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// `prompt -> text`. Implementations may fail, rate-limit or return malformed text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, GenerationError>;

    /// Model identifier, for logs and diagnostics.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice that carries any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .iter()
            .find_map(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing generation API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing generation model name");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build generation HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }

    /// Makes a raw chat-completions call and returns the full response object.
    /// Retries 429 responses with exponential backoff; nothing else is retried.
    pub async fn call(&self, request: CompletionRequest<'_>) -> Result<ChatResponse, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };

        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Generation provider rate limited (attempt {}), retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.trim())
                .json(&body)
                .send()
                .await?;

            let status = response.status();

            if status.as_u16() == 429 {
                continue;
            }

            if !status.is_success() {
                let raw = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                    .map(|e| e.error.message)
                    .unwrap_or(raw);
                return Err(GenerationError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: ChatResponse = response.json().await?;
            if let Some(usage) = &parsed.usage {
                debug!(
                    "Generation call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }
            return Ok(parsed);
        }

        Err(GenerationError::RateLimited {
            retries: MAX_RATE_LIMIT_RETRIES,
        })
    }
}

#[async_trait]
impl GenerationProvider for LlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, GenerationError> {
        let response = self.call(request).await?;
        response
            .text()
            .map(|t| t.trim().to_string())
            .ok_or(GenerationError::EmptyContent)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
