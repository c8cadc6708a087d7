//! The completion seam shared by every backend.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Bound on health checks, independent of the completion deadline.
pub(super) const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Sampling settings for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// `None` waits for as long as the service takes.
    pub timeout: Option<Duration>,
}

/// Text produced for a single-turn prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// The backend stopped at the token cap.
    pub truncated: bool,
    pub tokens_used: Option<u32>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            truncated: false,
            tokens_used: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM backend unreachable: {0}")]
    Unreachable(String),

    #[error("LLM backend answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM backend is rate limiting")]
    RateLimited,

    #[error("Unreadable LLM response: {0}")]
    Malformed(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("Could not obtain API key: {0}")]
    ApiKey(String),
}

impl LlmError {
    pub(super) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Unreachable(e.to_string())
        }
    }
}

/// Passes successful responses through, turns the rest into errors.
pub(super) async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// A chat-completion backend asked one user prompt at a time.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend name for logs, e.g. "openai".
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError>;

    async fn health_check(&self) -> Result<(), LlmError>;
}
