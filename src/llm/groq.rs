//! Chat-completions client with retry for transient failures.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{ChatMessage, ChatModel};
use crate::config::LlmConfig;
use crate::errors::AppError;

/// Request timeout for completion calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum retries for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms)
const RETRY_BASE_DELAY_MS: u64 = 100;

pub struct GroqClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
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

impl GroqClient {
    pub fn new(config: LlmConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::LlmError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn request_once(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let payload = serde_json::json!({
            "messages": messages,
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": max_tokens,
        });

        let res = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::LlmError(format!("request failed: {e}")))?;

        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::LlmUnavailable);
        }
        if !status.is_success() {
            let error_body = res.text().await.unwrap_or_default();
            return Err(AppError::LlmError(format!("API error {status}: {error_body}")));
        }

        let body: CompletionResponse = res
            .json()
            .await
            .map_err(|e| AppError::LlmError(format!("parse error: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::LlmError("empty completion".to_string()))
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, AppError> {
        let mut last_error = AppError::LlmError("unknown error".to_string());

        for attempt in 0..MAX_RETRIES {
            match self.request_once(messages, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    // A bad credential will not fix itself on retry
                    if matches!(e, AppError::LlmUnavailable) {
                        return Err(e);
                    }
                    last_error = e;

                    if attempt < MAX_RETRIES - 1 {
                        // Exponential backoff with jitter
                        let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                        let jitter = rand::random::<u64>() % (delay / 2);

                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            delay_ms = delay + jitter,
                            error = %last_error,
                            "Completion request failed, retrying"
                        );

                        tokio::time::sleep(Duration::from_millis(delay + jitter)).await;
                    }
                }
            }
        }

        Err(last_error)
    }
}
