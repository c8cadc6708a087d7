//! moodtune
//!
//! Reads the emotion on a face in a live camera frame and asks a text
//! service for one song that fits it. This library exposes the internal
//! modules for testing and reuse by the binary.

pub mod capture;
pub mod classifier;
pub mod config;
pub mod emotion;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod recommendation;
pub mod server;

// Re-export commonly used types for convenience
pub use capture::{CaptureSession, Frame, SharedCaptureSession};
pub use classifier::{ExpressionClassifier, HttpExpressionClassifier};
pub use emotion::{CoarseEmotion, EmotionResult};
pub use pipeline::{PipelineState, RecommendationPipeline, TriggerOutcome};
pub use recommendation::{Language, LlmSongRecommender, SongRecommendation, SongRecommender};
pub use server::{run_server, RequestsLoggingLevel};
