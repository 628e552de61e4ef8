//! Chat provider abstraction shared by all LLM backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Parse a configured provider name, accepting common aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Some(ProviderKind::Openai),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "ollama" | "local" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }

    /// Rough USD cost per 1k tokens, used for run accounting
    pub fn cost_per_1k_tokens(&self) -> f64 {
        match self {
            ProviderKind::Openai => 0.002,
            ProviderKind::Anthropic => 0.009,
            ProviderKind::Gemini => 0.0007,
            ProviderKind::Ollama => 0.0,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// A provider-agnostic chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request model override; providers fall back to their configured
    /// model when unset
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.1,
            max_tokens: 1000,
            model: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Concatenated system messages, if any
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Messages excluding the system prompt, for APIs that take it apart
    pub fn conversation(&self) -> Vec<&ChatMessage> {
        self.messages.iter().filter(|m| m.role != "system").collect()
    }

    /// Flatten the exchange into a single completion-style prompt
    pub fn flatten_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.messages.len() + 1);
        for message in &self.messages {
            match message.role.as_str() {
                "system" => parts.push(format!("System instructions: {}", message.content)),
                "assistant" => parts.push(format!("Assistant: {}", message.content)),
                _ => parts.push(format!("Human: {}", message.content)),
            }
        }
        parts.push("Assistant:".to_string());
        parts.join("\n\n")
    }
}

/// Token accounting as reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A completed chat exchange
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub provider: ProviderKind,
    pub model: String,
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Estimated USD cost of this exchange
    pub fn estimated_cost(&self) -> f64 {
        self.usage.total() as f64 / 1000.0 * self.provider.cost_per_1k_tokens()
    }
}

/// LLM layer errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {0} is not configured")]
    NotConfigured(ProviderKind),

    #[error("No available provider (tried: {0})")]
    NoAvailableProvider(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether retrying the same provider can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::RequestFailed(_) => true,
            LlmError::Upstream { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Map transport failures onto the timeout/request split
pub(crate) fn request_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(e.to_string())
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

/// Chat provider trait implemented per vendor
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Default model this provider was configured with
    fn model(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Cheap reachability probe; providers without one report `true`
    async fn health_check(&self) -> bool;
}
