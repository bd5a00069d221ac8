//! Provider abstraction (§4.3): OpenRouter and AgentRouter both expose the
//! same OpenAI-compatible chat-completion schema, so one HTTP client plus a
//! base-URL switch covers both — grounded on `OpenRouterBridge`'s
//! `ChatRequest { model, messages }` / `ChatResponse { choices[].message.content }`
//! shape and bearer-header construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sampling::Sampling;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const AGENTROUTER_BASE_URL: &str = "https://agentrouter.org/v1";

/// Maximum accepted response body size (§4.3 "≈ 1 MB").
pub const MAX_RESPONSE_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    AgentRouter,
}

impl Provider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenRouter => OPENROUTER_BASE_URL,
            Provider::AgentRouter => AGENTROUTER_BASE_URL,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openrouter" => Some(Provider::OpenRouter),
            "agentrouter" => Some(Provider::AgentRouter),
            _ => None,
        }
    }
}

#[derive(Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: String, system_prompt: String, user_prompt: String, sampling: Sampling) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user".into(),
                    content: user_prompt,
                },
            ],
            temperature: Some(sampling.temperature),
            top_p: Some(sampling.top_p),
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            max_tokens: Some(sampling.max_tokens),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Outcome of a single provider call, before retry classification (§4.3).
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
pub struct ProviderCallError {
    /// `None` for a connection/transport failure (never reached the server).
    pub status: Option<u16>,
    pub message: String,
}

/// One HTTP call, no retry logic — `crate::retry` wraps this loop.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call_once(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderCallError>;
}

/// The OpenAI-compatible HTTP client shared by both providers. The bearer
/// credential lives only in the `Authorization` header, never in a log line
/// or span field (§4.3 Security).
pub struct HttpLlmProvider {
    client: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl HttpLlmProvider {
    pub fn new(provider: Provider, base_url_override: Option<String>, bearer: String, per_call_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(per_call_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url_override.unwrap_or_else(|| provider.default_base_url().to_string()),
            bearer,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn call_once(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderCallError> {
        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.bearer))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderCallError {
                status: None,
                message: format!("request failed: {e}"),
            })?;

        let status = res.status().as_u16();

        let content_length = res.content_length().unwrap_or(0);
        if content_length as usize > crate::provider::MAX_RESPONSE_BYTES {
            return Err(ProviderCallError {
                status: Some(status),
                message: "response exceeded the maximum accepted size".into(),
            });
        }

        let body = res.text().await.map_err(|e| ProviderCallError {
            status: Some(status),
            message: format!("failed reading response body: {e}"),
        })?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(ProviderCallError {
                status: Some(status),
                message: "response exceeded the maximum accepted size".into(),
            });
        }

        if !(200..300).contains(&status) {
            return Err(ProviderCallError {
                status: Some(status),
                message: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| ProviderCallError {
            status: Some(status),
            message: format!("response was not the expected chat-completion shape: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(ProviderResponse { status, body: content })
    }
}
