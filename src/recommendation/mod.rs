//! Song recommendation from a generative text service.
//!
//! The service is asked for a single well-known song matching an emotion and a
//! language. Its answer is untrusted: it is validated against a fixed schema
//! and either becomes a [`SongRecommendation`] or a [`RecommendationFailure`],
//! never something in between.

mod client;
mod payload;
mod prompt;

pub use client::{LlmSongRecommender, MAX_TOKENS, TEMPERATURE};
pub use payload::{parse_song_payload, provider_search_url};
pub use prompt::build_prompt;

use crate::emotion::CoarseEmotion;
use crate::llm::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default streaming provider search page; the URL-encoded query is appended.
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://open.spotify.com/search/";

/// Languages a recommendation can be requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Tamil,
    Telugu,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Tamil,
        Language::Telugu,
        Language::Hindi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Tamil => "tamil",
            Language::Telugu => "telugu",
            Language::Hindi => "hindi",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::English
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecommendationRequest {
    pub emotion: CoarseEmotion,
    pub language: Language,
}

impl RecommendationRequest {
    pub fn new(emotion: CoarseEmotion, language: Language) -> Self {
        Self { emotion, language }
    }
}

/// A validated song suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecommendation {
    pub title: String,
    pub artist: String,
    /// Always the language that was asked for.
    pub language: Language,
    pub search_query: String,
    /// Derived from `search_query`, never taken from the service.
    pub provider_url: String,
}

/// Why a recommendation could not be produced.
#[derive(Debug, Error)]
pub enum RecommendationFailure {
    #[error("Recommendation service unreachable: {0}")]
    Transport(String),

    #[error("Recommendation service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Recommendation is not the expected JSON object: {0}")]
    MalformedPayload(String),

    #[error("Recommendation is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Recommendation request timed out")]
    Timeout,
}

impl From<LlmError> for RecommendationFailure {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Unreachable(message) | LlmError::ApiKey(message) => {
                RecommendationFailure::Transport(message)
            }
            LlmError::Status { status, body } => RecommendationFailure::Service {
                status,
                message: body,
            },
            LlmError::RateLimited => RecommendationFailure::Service {
                status: 429,
                message: "rate limited".to_string(),
            },
            LlmError::Malformed(message) => RecommendationFailure::MalformedPayload(message),
            LlmError::Timeout => RecommendationFailure::Timeout,
        }
    }
}

/// Song recommendation capability.
#[async_trait]
pub trait SongRecommender: Send + Sync {
    /// Ask for one song. Exactly one external call, no retries.
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<SongRecommendation, RecommendationFailure>;
}
