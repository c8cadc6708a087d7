//! Fake collaborator services
//!
//! Small axum servers standing in for the expression classification service
//! and an OpenAI-compatible chat completions API. Each runs on a random port
//! and records what it was sent.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

async fn serve(app: Router) -> (String, tokio::sync::oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("Failed to get local address")
        .port();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Fake service failed");
    });
    (format!("http://127.0.0.1:{}", port), shutdown_tx)
}

/// What the fake classifier answers.
#[derive(Clone, Debug)]
pub enum ClassifierReply {
    /// A face with these expression scores.
    Face(Value),
    NoFace,
    /// Non-success status on /classify.
    Status(u16),
    /// Non-success status on /models/load.
    LoadFails,
}

impl ClassifierReply {
    pub fn happy() -> Self {
        ClassifierReply::Face(json!({
            "happy": 0.91, "sad": 0.01, "neutral": 0.05, "angry": 0.01,
            "fearful": 0.0, "disgusted": 0.01, "surprised": 0.01
        }))
    }

    pub fn sad() -> Self {
        ClassifierReply::Face(json!({
            "happy": 0.02, "sad": 0.12, "neutral": 0.1, "angry": 0.01,
            "fearful": 0.74, "disgusted": 0.0, "surprised": 0.01
        }))
    }
}

#[derive(Default)]
pub struct ClassifierLog {
    pub loads: usize,
    /// Request bodies sent to /classify.
    pub frames: Vec<Value>,
}

#[derive(Clone)]
struct ClassifierState {
    reply: Arc<Mutex<ClassifierReply>>,
    log: Arc<Mutex<ClassifierLog>>,
}

pub struct FakeClassifierService {
    pub base_url: String,
    reply: Arc<Mutex<ClassifierReply>>,
    log: Arc<Mutex<ClassifierLog>>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

async fn load_models(State(state): State<ClassifierState>) -> StatusCode {
    state.log.lock().unwrap().loads += 1;
    match *state.reply.lock().unwrap() {
        ClassifierReply::LoadFails => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

async fn classify(State(state): State<ClassifierState>, Json(body): Json<Value>) -> Response {
    state.log.lock().unwrap().frames.push(body);
    let reply = state.reply.lock().unwrap().clone();
    match reply {
        ClassifierReply::Face(expressions) => {
            Json(json!({"face_found": true, "expressions": expressions})).into_response()
        }
        ClassifierReply::NoFace => Json(json!({"face_found": false})).into_response(),
        ClassifierReply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            "classifier exploded",
        )
            .into_response(),
        ClassifierReply::LoadFails => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

impl FakeClassifierService {
    pub async fn spawn(reply: ClassifierReply) -> Self {
        let reply = Arc::new(Mutex::new(reply));
        let log = Arc::new(Mutex::new(ClassifierLog::default()));
        let app = Router::new()
            .route("/models/load", post(load_models))
            .route("/classify", post(classify))
            .with_state(ClassifierState {
                reply: reply.clone(),
                log: log.clone(),
            });
        let (base_url, shutdown_tx) = serve(app).await;
        Self {
            base_url,
            reply,
            log,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn set_reply(&self, reply: ClassifierReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn loads(&self) -> usize {
        self.log.lock().unwrap().loads
    }

    pub fn frames(&self) -> Vec<Value> {
        self.log.lock().unwrap().frames.clone()
    }
}

/// What the fake chat completions API answers.
#[derive(Clone, Debug)]
pub enum CompletionReply {
    /// 200 with this assistant message content.
    Content(String),
    /// Non-success status.
    Status(u16),
    /// 200 with a body that is not a chat completion.
    Garbage,
    /// Answers like `Content`, but only after a pause.
    Delayed(std::time::Duration, String),
}

impl CompletionReply {
    pub fn song(title: &str, artist: &str, language: &str, query: &str) -> Self {
        CompletionReply::Content(
            json!({
                "title": title,
                "artist": artist,
                "language": language,
                "searchQuery": query,
            })
            .to_string(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct RecordedCompletion {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct CompletionState {
    reply: Arc<Mutex<CompletionReply>>,
    requests: Arc<Mutex<Vec<RecordedCompletion>>>,
}

pub struct FakeOpenAi {
    pub base_url: String,
    reply: Arc<Mutex<CompletionReply>>,
    requests: Arc<Mutex<Vec<RecordedCompletion>>>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

async fn chat_completions(
    State(state): State<CompletionState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedCompletion {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    let reply = state.reply.lock().unwrap().clone();
    match reply {
        CompletionReply::Delayed(pause, content) => {
            tokio::time::sleep(pause).await;
            completion_body(content).into_response()
        }
        CompletionReply::Content(content) => completion_body(content).into_response(),
        CompletionReply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({"error": {"message": "upstream failure"}})),
        )
            .into_response(),
        CompletionReply::Garbage => "<html>not json</html>".into_response(),
    }
}

fn completion_body(content: String) -> Json<Value> {
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 60, "completion_tokens": 30, "total_tokens": 90}
    }))
}

impl FakeOpenAi {
    pub async fn spawn(reply: CompletionReply) -> Self {
        let reply = Arc::new(Mutex::new(reply));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/chat/completions", post(chat_completions))
            .with_state(CompletionState {
                reply: reply.clone(),
                requests: requests.clone(),
            });
        let (base_url, shutdown_tx) = serve(app).await;
        Self {
            base_url,
            reply,
            requests,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn set_reply(&self, reply: CompletionReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<RecordedCompletion> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct OllamaState {
    content: Arc<String>,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// Fake Ollama server answering `/api/chat` with a fixed message.
pub struct FakeOllama {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

async fn ollama_chat(State(state): State<OllamaState>, Json(body): Json<Value>) -> Json<Value> {
    let model = body["model"].clone();
    state.requests.lock().unwrap().push(body);
    Json(json!({
        "model": model,
        "created_at": "2024-01-01T00:00:00Z",
        "message": {"role": "assistant", "content": state.content.as_str()},
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": 42,
        "eval_count": 24
    }))
}

impl FakeOllama {
    pub async fn spawn(content: impl Into<String>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/chat", post(ollama_chat))
            .route(
                "/api/tags",
                axum::routing::get(|| async { Json(json!({"models": [{"name": "llama3.1:8b"}]})) }),
            )
            .with_state(OllamaState {
                content: Arc::new(content.into()),
                requests: requests.clone(),
            });
        let (base_url, shutdown_tx) = serve(app).await;
        Self {
            base_url,
            requests,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}
