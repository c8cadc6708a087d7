use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all moodtune metrics
const PREFIX: &str = "moodtune";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Pipeline Metrics
    pub static ref PIPELINE_CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_cycles_total"), "Finished recommendation cycles"),
        &["outcome", "emotion"]
    ).expect("Failed to create pipeline_cycles_total metric");

    pub static ref PIPELINE_IGNORED_TRIGGERS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_ignored_triggers_total"), "Recommendation triggers that did not start a cycle"),
        &["reason"]
    ).expect("Failed to create pipeline_ignored_triggers_total metric");

    pub static ref PIPELINE_CYCLE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_pipeline_cycle_duration_seconds"),
            "Time from trigger to Ready or Failed"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["outcome"]
    ).expect("Failed to create pipeline_cycle_duration_seconds metric");

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(PIPELINE_CYCLES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_IGNORED_TRIGGERS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_CYCLE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_cycle(outcome: &str, emotion: &str, duration: Duration) {
    PIPELINE_CYCLES_TOTAL
        .with_label_values(&[outcome, emotion])
        .inc();
    PIPELINE_CYCLE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn record_ignored_trigger(reason: &str) {
    PIPELINE_IGNORED_TRIGGERS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Prometheus scrape handler.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        );
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!("Metrics output is not UTF-8: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
        }
    }
}
