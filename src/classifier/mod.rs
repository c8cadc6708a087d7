//! Facial expression classifier adapter.
//!
//! The expression model itself is an external capability. This module pins
//! down its contract: one frame in, either a complete seven-label
//! distribution or an explicit "no face" answer out.

mod http;
mod lifecycle;

pub use http::HttpExpressionClassifier;
pub use lifecycle::{ModelLifecycle, ModelState};

use crate::capture::Frame;
use crate::emotion::{DistributionError, ExpressionDistribution};
use async_trait::async_trait;
use thiserror::Error;

/// Result of classifying one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A face was found; scores for all seven expressions.
    Face(ExpressionDistribution),
    /// The frame contains no detectable face. Not an error.
    NoFaceFound,
}

impl Classification {
    pub fn distribution(&self) -> Option<&ExpressionDistribution> {
        match self {
            Classification::Face(distribution) => Some(distribution),
            Classification::NoFaceFound => None,
        }
    }
}

/// Ways the classifier can be unavailable for a frame.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Classifier API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Incomplete expression distribution: {0}")]
    IncompleteDistribution(#[from] DistributionError),

    #[error("Classification timed out")]
    Timeout,
}

/// Facial expression classification capability.
#[async_trait]
pub trait ExpressionClassifier: Send + Sync {
    /// Model loading lifecycle, observable by callers.
    fn lifecycle(&self) -> &ModelLifecycle;

    /// Load the model. Idempotent; a failed load may simply be retried.
    async fn initialize(&self) -> Result<(), ClassifierError>;

    /// Classify the single most prominent face in `frame`.
    ///
    /// Loads the model first if nobody did.
    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError>;
}
