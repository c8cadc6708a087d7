//! Pipeline state definitions.

use crate::emotion::EmotionResult;
use crate::recommendation::{Language, SongRecommendation};
use serde::Serialize;

/// State of the recommendation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// No capture session.
    Idle,

    /// Capture session running, no cycle yet.
    Capturing,

    /// Waiting on the expression classifier.
    Detecting { cycle_id: String, language: Language },

    /// Waiting on the recommendation service.
    Recommending {
        cycle_id: String,
        language: Language,
        emotion: EmotionResult,
    },

    /// Cycle finished with a song.
    Ready {
        cycle_id: String,
        emotion: EmotionResult,
        song: SongRecommendation,
        /// Unix timestamp (milliseconds).
        finished_at: i64,
    },

    /// Cycle finished without a song. Nothing from the cycle is kept.
    Failed {
        cycle_id: String,
        cause: FailureCause,
        notice: String,
        /// Unix timestamp (milliseconds).
        finished_at: i64,
    },
}

/// Which collaborator ended the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    ClassifierUnavailable,
    RecommendationFailure,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::ClassifierUnavailable => "classifier_unavailable",
            FailureCause::RecommendationFailure => "recommendation_failure",
        }
    }
}

/// Data-free view of [`PipelineState`], used for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Capturing,
    Detecting,
    Recommending,
    Ready,
    Failed,
}

impl PipelinePhase {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        matches!(
            (self, next),
            (Idle, Capturing)
                | (Capturing, Idle)
                | (Capturing, Detecting)
                | (Ready, Detecting)
                | (Failed, Detecting)
                | (Detecting, Recommending)
                | (Detecting, Failed)
                | (Recommending, Ready)
                | (Recommending, Failed)
        )
    }
}

impl PipelineState {
    pub fn phase(&self) -> PipelinePhase {
        match self {
            PipelineState::Idle => PipelinePhase::Idle,
            PipelineState::Capturing => PipelinePhase::Capturing,
            PipelineState::Detecting { .. } => PipelinePhase::Detecting,
            PipelineState::Recommending { .. } => PipelinePhase::Recommending,
            PipelineState::Ready { .. } => PipelinePhase::Ready,
            PipelineState::Failed { .. } => PipelinePhase::Failed,
        }
    }

    /// A cycle is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PipelineState::Detecting { .. } | PipelineState::Recommending { .. }
        )
    }

    /// The last cycle has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Ready { .. } | PipelineState::Failed { .. })
    }

    /// A recommendation trigger may start a new cycle from here.
    pub fn accepts_trigger(&self) -> bool {
        self.phase().can_transition_to(PipelinePhase::Detecting)
    }

    pub fn cycle_id(&self) -> Option<&str> {
        match self {
            PipelineState::Idle | PipelineState::Capturing => None,
            PipelineState::Detecting { cycle_id, .. }
            | PipelineState::Recommending { cycle_id, .. }
            | PipelineState::Ready { cycle_id, .. }
            | PipelineState::Failed { cycle_id, .. } => Some(cycle_id),
        }
    }
}
