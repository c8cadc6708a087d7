//! Ollama backend using the non-streaming `/api/chat` endpoint.

use super::provider::{
    check_status, Completion, CompletionOptions, LlmError, LlmProvider, HEALTH_CHECK_TIMEOUT,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// `base_url` is the server root, e.g. "http://localhost:11434".
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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
            messages: [Turn {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: Sampling {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending Ollama chat");

        let mut request = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(LlmError::from_transport)?;
        let reply: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        debug!(done_reason = ?reply.done_reason, "Ollama chat received");
        Ok(Completion {
            text: reply.message.content,
            truncated: reply.done_reason.as_deref() == Some("length"),
            tokens_used: reply.eval_count,
        })
    }

    /// Also warns when the configured model has not been pulled.
    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(LlmError::from_transport)?;

        let tags: TagsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        if !tags.models.iter().any(|m| m.name == self.model) {
            warn!(
                model = %self.model,
                available = ?tags.models.iter().map(|m| &m.name).collect::<Vec<_>>(),
                "Configured model is not pulled on the Ollama server"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Turn<'a>; 1],
    stream: bool,
    options: Sampling,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Sampling {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    name: String,
}
