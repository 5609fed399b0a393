//! Generative text service
//!
//! One request/response call against an OpenAI-compatible chat-completions
//! endpoint. Consumers (query optimizer, assisted tagging, response
//! generator, summaries) hold an `Option<Arc<dyn ChatModel>>` and fall back
//! to their deterministic paths when no model is configured or a call fails.

pub mod groq;

use async_trait::async_trait;
use serde::Serialize;

pub use groq::GroqClient;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a role-tagged message list, return the generated text.
    async fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, AppError>;
}
