//! LLM port - Interface to a language model provider
//!
//! The engine only ever sees final text or an error. Transport details
//! (HTTP framing, auth headers, provider payloads) stay in the adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: 0.8,
            max_tokens: 1024,
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
}

/// Receives the accumulated text of a streaming response after each delta
pub type PartialTextSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Errors surfaced by an LLM adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Network or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// Non-success response from the provider
    #[error("Provider error: {0}")]
    Provider(String),
    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Generate a completion and return its final text
    ///
    /// When `on_partial` is given the adapter should stream and report the
    /// text accumulated so far; only the returned text is authoritative.
    async fn generate(
        &self,
        request: LlmRequest,
        on_partial: Option<PartialTextSink>,
    ) -> Result<String, LlmError>;
}
