//! OpenAI chat-completions backend.
//!
//! Anything speaking the same API (OpenRouter, vLLM, Together) works too.

use super::provider::{
    check_status, Completion, CompletionOptions, LlmError, LlmProvider, HEALTH_CHECK_TIMEOUT,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const API_KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the bearer token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    None,
    Static(String),
    /// Shell command printing the key, run before every request so rotated
    /// tokens are picked up.
    Command(String),
}

impl ApiKeySource {
    async fn resolve(&self) -> Result<Option<String>, LlmError> {
        let cmd = match self {
            ApiKeySource::None => return Ok(None),
            ApiKeySource::Static(key) => return Ok(Some(key.clone())),
            ApiKeySource::Command(cmd) => cmd,
        };

        debug!(command = %cmd, "Running api key command");
        let output = tokio::time::timeout(
            API_KEY_COMMAND_TIMEOUT,
            Command::new("sh").arg("-c").arg(cmd).output(),
        )
        .await
        .map_err(|_| {
            warn!(command = %cmd, "api key command timed out");
            LlmError::ApiKey(format!("'{}' timed out", cmd))
        })?
        .map_err(|e| LlmError::ApiKey(format!("'{}' did not run: {}", cmd, e)))?;

        if !output.status.success() {
            return Err(LlmError::ApiKey(format!(
                "'{}' exited with {}: {}",
                cmd,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if key.is_empty() {
            return Err(LlmError::ApiKey(format!("'{}' printed no key", cmd)));
        }
        Ok(Some(key))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        Ok(match self.resolve().await? {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }
}

pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKeySource,
}

impl OpenAIProvider {
    /// `base_url` is the API root, e.g. "https://api.openai.com/v1".
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: ApiKeySource,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending chat completion");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        request = self.api_key.authorize(request).await?;
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(LlmError::from_transport)?;
        let reply: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let choice = reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("no choices".to_string()))?;

        let completion = Completion {
            text: choice.message.content.unwrap_or_default(),
            truncated: choice.finish_reason.as_deref() == Some("length"),
            tokens_used: reply.usage.map(|u| u.completion_tokens),
        };
        debug!(
            truncated = completion.truncated,
            tokens = ?completion.tokens_used,
            "Chat completion received"
        );
        Ok(completion)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT);
        let response = self
            .api_key
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(LlmError::from_transport)?;
        check_status(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    completion_tokens: u32,
}
