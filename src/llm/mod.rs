//! Chat-completion backends behind one trait, so the song recommender can
//! talk to OpenAI-compatible services or a local Ollama server alike.

mod ollama;
mod openai;
mod provider;

pub use ollama::OllamaProvider;
pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{Completion, CompletionOptions, LlmError, LlmProvider};
