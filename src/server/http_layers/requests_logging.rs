//! Request logging middleware

use super::super::state::ServerState;
use crate::metrics::record_http_request;
use axum::extract::State;
use axum::{
    body::Body,
    http::{
        header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE},
        Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get(CONTENT_LENGTH)
        .ok_or("no content-length")?
        .to_str()
        .map_err(|_| "content-length is not text")?
        .parse()
        .map_err(|_| "content-length is not a number")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} headers:", label);
    for (name, value) in headers {
        info!("    {}: {:?}", name, value);
    }
}

/// Frames are binary, only text-ish bodies are worth printing.
fn is_printable(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json") || ct.starts_with("text/"))
        .unwrap_or(false)
}

async fn buffer_body(body: Body, size: usize, what: &str) -> Result<axum::body::Bytes, Response<Body>> {
    axum::body::to_bytes(body, size).await.map_err(|err| {
        error!("Failed to read {} body: {:?}", what, err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    })
}

/// Returns the size to buffer when the body is worth printing.
fn log_body_summary(label: &str, headers: &HeaderMap) -> Option<usize> {
    let size = match content_length(headers) {
        Ok(size) => size,
        Err(reason) => {
            info!("  {} body: not logged, {}", label, reason);
            return None;
        }
    };
    let shown = byte_unit::Byte::from(size);
    if size >= MAX_LOGGABLE_BODY_LENGTH {
        info!("  {} body: {:#}, too big to log", label, shown);
        None
    } else if !is_printable(headers) {
        info!("  {} body: {:#} of binary", label, shown);
        None
    } else {
        Some(size)
    }
}

pub async fn log_requests(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, uri);
    }

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        if let Some(size) = log_body_summary("Req", request.headers()) {
            let (parts, body) = request.into_parts();
            let bytes = match buffer_body(body, size, "request").await {
                Ok(bytes) => bytes,
                Err(response) => return response,
            };
            info!("  Req body:\n{}", String::from_utf8_lossy(&bytes));
            request = Request::from_parts(parts, Body::from(bytes));
        }
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        if let Some(size) = log_body_summary("Resp", response.headers()) {
            let (parts, body) = response.into_parts();
            let bytes = match buffer_body(body, size, "response").await {
                Ok(bytes) => bytes,
                Err(response) => return response,
            };
            info!("  Resp body:\n{}", String::from_utf8_lossy(&bytes));
            response = Response::from_parts(parts, Body::from(bytes));
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }

    record_http_request(&method, &path, status, duration);

    response
}
