use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, info, warn};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, state::*, ServerConfig};
use crate::capture::{CaptureSession, Frame};
use crate::classifier::ModelState;
use crate::metrics::metrics_handler;
use crate::pipeline::{PipelineState, TriggerOutcome};
use crate::recommendation::Language;

#[derive(Serialize)]
struct ServerStats {
    pub version: &'static str,
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct StateResponse {
    pipeline: PipelineState,
    capture_active: bool,
    classifier: ModelState,
    languages: [Language; 4],
    default_language: Language,
}

#[derive(Deserialize, Debug)]
struct RecommendationBody {
    #[serde(default)]
    pub language: Option<Language>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

async fn get_state(State(state): State<ServerState>) -> impl IntoResponse {
    Json(StateResponse {
        pipeline: state.pipeline.state(),
        capture_active: state.capture.is_active(),
        classifier: state.pipeline.classifier().lifecycle().state(),
        languages: Language::ALL,
        default_language: state.config.default_language,
    })
}

async fn start_capture(
    State(capture): State<GuardedCaptureSession>,
    State(pipeline): State<GuardedPipeline>,
) -> StatusCode {
    capture.start();
    pipeline.capture_started();
    StatusCode::NO_CONTENT
}

async fn stop_capture(
    State(capture): State<GuardedCaptureSession>,
    State(pipeline): State<GuardedPipeline>,
) -> StatusCode {
    capture.stop();
    pipeline.capture_stopped();
    StatusCode::NO_CONTENT
}

async fn put_frame(
    State(capture): State<GuardedCaptureSession>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if body.is_empty() {
        debug!("Ignoring empty frame");
        return StatusCode::NO_CONTENT;
    }

    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.starts_with("image/"));
    let frame = match declared {
        Some(content_type) => Frame::with_content_type(body.to_vec(), content_type),
        None => Frame::new(body.to_vec()),
    };

    if capture.push_frame(frame) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CONFLICT
    }
}

async fn post_recommendation(
    State(state): State<ServerState>,
    Json(body): Json<RecommendationBody>,
) -> Json<TriggerOutcome> {
    let language = body.language.unwrap_or(state.config.default_language);
    Json(state.pipeline.get_recommendation(language).await)
}

pub fn make_app(
    config: ServerConfig,
    capture: GuardedCaptureSession,
    pipeline: GuardedPipeline,
) -> Router {
    let state = ServerState::new(config.clone(), capture, pipeline);

    let capture_routes: Router = Router::new()
        .route("/start", post(start_capture))
        .route("/stop", post(stop_capture))
        .route(
            "/frame",
            put(put_frame).layer(DefaultBodyLimit::max(config.max_frame_bytes)),
        )
        .with_state(state.clone());

    let pipeline_routes: Router = Router::new()
        .route("/state", get(get_state))
        .route("/recommendation", post(post_recommendation))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone())
        .nest("/v1/capture", capture_routes)
        .nest("/v1", pipeline_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    app
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(
    config: ServerConfig,
    capture: GuardedCaptureSession,
    pipeline: GuardedPipeline,
) -> Result<()> {
    let classifier = pipeline.classifier().clone();
    tokio::spawn(async move {
        if let Err(e) = classifier.initialize().await {
            warn!("Expression model warm-up failed, will retry on first use: {}", e);
        }
    });

    let port = config.port;
    let app = make_app(config, capture, pipeline);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
