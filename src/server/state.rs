use axum::extract::FromRef;

use crate::capture::SharedCaptureSession;
use crate::pipeline::RecommendationPipeline;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedPipeline = Arc<RecommendationPipeline>;
pub type GuardedCaptureSession = Arc<SharedCaptureSession>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: GuardedPipeline,
    pub capture: GuardedCaptureSession,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        capture: GuardedCaptureSession,
        pipeline: GuardedPipeline,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            pipeline,
            capture,
        }
    }
}

impl FromRef<ServerState> for GuardedPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for GuardedCaptureSession {
    fn from_ref(input: &ServerState) -> Self {
        input.capture.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
