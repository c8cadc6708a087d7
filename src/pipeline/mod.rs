//! Pipeline orchestration: one trigger, one capture → detect → recommend cycle.

mod orchestrator;
mod state;

pub use orchestrator::{IgnoreReason, RecommendationPipeline, TriggerOutcome, FAILURE_NOTICE};
pub use state::{FailureCause, PipelinePhase, PipelineState};
