//! Recommendation client backed by an [`LlmProvider`].

use super::{
    build_prompt, parse_song_payload, RecommendationFailure, RecommendationRequest,
    SongRecommendation, SongRecommender, DEFAULT_SEARCH_BASE_URL,
};
use crate::llm::{CompletionOptions, LlmProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sampling temperature for song requests.
pub const TEMPERATURE: f32 = 0.7;
/// Completion length cap for song requests.
pub const MAX_TOKENS: u32 = 150;

pub struct LlmSongRecommender {
    llm: Arc<dyn LlmProvider>,
    search_base_url: String,
    deadline: Option<Duration>,
}

impl LlmSongRecommender {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            deadline: None,
        }
    }

    /// Streaming provider search page used to build `provider_url`.
    pub fn with_search_base_url(mut self, search_base_url: impl Into<String>) -> Self {
        self.search_base_url = search_base_url.into();
        self
    }

    /// Give up on the service after `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: TEMPERATURE,
            max_tokens: Some(MAX_TOKENS),
            timeout: self.deadline,
        }
    }
}

#[async_trait]
impl SongRecommender for LlmSongRecommender {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<SongRecommendation, RecommendationFailure> {
        let prompt = build_prompt(request);

        debug!(
            provider = %self.llm.name(),
            model = %self.llm.model(),
            emotion = %request.emotion,
            language = %request.language,
            "Requesting song recommendation"
        );

        let completion = self
            .llm
            .complete(&prompt, &self.completion_options())
            .await?;

        if completion.truncated {
            warn!(
                tokens = ?completion.tokens_used,
                "Song recommendation hit the token limit, payload may be cut short"
            );
        }

        let song = parse_song_payload(
            &completion.text,
            request.language,
            &self.search_base_url,
        )?;

        debug!(title = %song.title, artist = %song.artist, "Song recommendation accepted");
        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::CoarseEmotion;
    use crate::llm::{Completion, LlmError};
    use crate::recommendation::Language;
    use std::sync::Mutex;

    /// Scripted provider that records what it was asked.
    struct ScriptedLlm {
        reply: Mutex<Option<Result<String, LlmError>>>,
        seen: Mutex<Vec<(String, CompletionOptions)>>,
    }

    impl ScriptedLlm {
        fn replying(reply: Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn complete(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> Result<Completion, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), options.clone()));
            let content = self
                .reply
                .lock()
                .unwrap()
                .take()
                .expect("provider called more than once")?;
            Ok(Completion::new(content))
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    fn request() -> RecommendationRequest {
        RecommendationRequest::new(CoarseEmotion::Sad, Language::Telugu)
    }

    #[tokio::test]
    async fn test_single_call_with_fixed_options() {
        let llm = ScriptedLlm::replying(Ok(
            r#"{"title": "Nee Kallalona", "artist": "Sid Sriram", "language": "telugu", "searchQuery": "Nee Kallalona Sid Sriram"}"#.to_string(),
        ));
        let recommender = LlmSongRecommender::new(llm.clone())
            .with_search_base_url("https://music.example/search/");

        let song = recommender.recommend(&request()).await.unwrap();
        assert_eq!(song.language, Language::Telugu);
        assert_eq!(
            song.provider_url,
            "https://music.example/search/Nee%20Kallalona%20Sid%20Sriram"
        );

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (prompt, options) = &seen[0];
        assert!(prompt.contains("telugu"));
        assert!(prompt.contains("sad"));
        assert_eq!(options.temperature, TEMPERATURE);
        assert_eq!(options.max_tokens, Some(MAX_TOKENS));
        assert_eq!(options.timeout, None);
    }

    #[tokio::test]
    async fn test_deadline_is_forwarded() {
        let llm = ScriptedLlm::replying(Ok(r#"{"title": "t", "artist": "a", "searchQuery": "q"}"#.to_string()));
        let recommender =
            LlmSongRecommender::new(llm.clone()).with_deadline(Some(Duration::from_secs(3)));
        recommender.recommend(&request()).await.unwrap();
        assert_eq!(
            llm.seen.lock().unwrap()[0].1.timeout,
            Some(Duration::from_secs(3))
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_failure() {
        let llm = ScriptedLlm::replying(Err(LlmError::Unreachable("connection refused".into())));
        let result = LlmSongRecommender::new(llm).recommend(&request()).await;
        assert!(matches!(result, Err(RecommendationFailure::Transport(_))));
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let llm = ScriptedLlm::replying(Err(LlmError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let result = LlmSongRecommender::new(llm).recommend(&request()).await;
        assert!(matches!(
            result,
            Err(RecommendationFailure::Service { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_prose_reply_is_failure() {
        let llm = ScriptedLlm::replying(Ok("I recommend something soothing.".to_string()));
        let result = LlmSongRecommender::new(llm).recommend(&request()).await;
        assert!(matches!(
            result,
            Err(RecommendationFailure::MalformedPayload(_))
        ));
    }
}
