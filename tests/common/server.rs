//! Test server lifecycle management

use super::constants::*;
use super::fakes::{ClassifierReply, CompletionReply, FakeClassifierService, FakeOpenAi};
use moodtune::capture::SharedCaptureSession;
use moodtune::classifier::HttpExpressionClassifier;
use moodtune::llm::{ApiKeySource, OpenAIProvider};
use moodtune::pipeline::RecommendationPipeline;
use moodtune::recommendation::LlmSongRecommender;
use moodtune::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Running moodtune instance wired to fake collaborators.
///
/// When dropped, the server and both fakes shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    pub classifier: FakeClassifierService,
    pub llm: FakeOpenAi,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose classifier sees a happy face and whose LLM
    /// answers with a well-formed song.
    pub async fn spawn() -> Self {
        Self::spawn_with(
            ClassifierReply::happy(),
            CompletionReply::song("Happy", "Pharrell Williams", "english", "Happy Pharrell Williams"),
        )
        .await
    }

    /// Spawns a server on a random port with scripted collaborators.
    ///
    /// # Panics
    ///
    /// Panics if a port cannot be bound or the server does not become ready.
    pub async fn spawn_with(classifier_reply: ClassifierReply, llm_reply: CompletionReply) -> Self {
        let classifier = FakeClassifierService::spawn(classifier_reply).await;
        let llm = FakeOpenAi::spawn(llm_reply).await;

        let capture = Arc::new(SharedCaptureSession::new());
        let provider = OpenAIProvider::new(
            llm.base_url.as_str(),
            TEST_MODEL,
            ApiKeySource::Static(TEST_API_KEY.to_string()),
        );
        let recommender = LlmSongRecommender::new(Arc::new(provider))
            .with_search_base_url(SEARCH_BASE_URL)
            .with_deadline(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)));
        let pipeline = Arc::new(RecommendationPipeline::new(
            capture.clone(),
            Arc::new(HttpExpressionClassifier::new(classifier.base_url.as_str())),
            Arc::new(recommender),
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..ServerConfig::default()
        };
        let app = make_app(config, capture, pipeline);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            classifier,
            llm,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
