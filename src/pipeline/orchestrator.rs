//! Recommendation pipeline orchestrator.

use super::state::{FailureCause, PipelinePhase, PipelineState};
use crate::capture::{CaptureSession, Frame};
use crate::classifier::{Classification, ClassifierError, ExpressionClassifier};
use crate::emotion::{map_detection, EmotionResult};
use crate::metrics;
use crate::recommendation::{
    Language, RecommendationFailure, RecommendationRequest, SongRecommendation, SongRecommender,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The only message users see when a cycle fails.
pub const FAILURE_NOTICE: &str = "Error getting recommendation. Please try again.";

/// Why a trigger did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The capture session is not running.
    CaptureInactive,
    /// The session is running but has no usable frame yet.
    NoFrame,
    /// The pipeline has not been told the capture session started.
    NotCapturing,
    /// Another cycle is still running.
    CycleInFlight,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::CaptureInactive => "capture_inactive",
            IgnoreReason::NoFrame => "no_frame",
            IgnoreReason::NotCapturing => "not_capturing",
            IgnoreReason::CycleInFlight => "cycle_in_flight",
        }
    }
}

/// What a recommendation trigger led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Ignored {
        reason: IgnoreReason,
    },
    Ready {
        emotion: EmotionResult,
        song: SongRecommendation,
    },
    Failed {
        notice: String,
    },
}

/// Drives capture → detection → mapping → recommendation.
///
/// The state lives in a watch channel: subscribers see every transition, and
/// a cycle is claimed with a single check-and-set on it, so at most one cycle
/// runs at a time without holding any lock across the external calls.
pub struct RecommendationPipeline {
    capture: Arc<dyn CaptureSession>,
    classifier: Arc<dyn ExpressionClassifier>,
    recommender: Arc<dyn SongRecommender>,
    state: watch::Sender<PipelineState>,
    call_deadline: Option<Duration>,
}

impl RecommendationPipeline {
    pub fn new(
        capture: Arc<dyn CaptureSession>,
        classifier: Arc<dyn ExpressionClassifier>,
        recommender: Arc<dyn SongRecommender>,
    ) -> Self {
        let initial = if capture.is_active() {
            PipelineState::Capturing
        } else {
            PipelineState::Idle
        };
        let (state, _) = watch::channel(initial);
        Self {
            capture,
            classifier,
            recommender,
            state,
            call_deadline: None,
        }
    }

    /// Bound each external call (classification, recommendation) by
    /// `deadline`. `None` waits indefinitely.
    pub fn with_call_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.call_deadline = deadline;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn classifier(&self) -> &Arc<dyn ExpressionClassifier> {
        &self.classifier
    }

    /// The capture session became active.
    pub fn capture_started(&self) {
        self.transition_if(PipelinePhase::Idle, PipelineState::Capturing);
    }

    /// The capture session stopped. A running cycle keeps going with the
    /// frame it already has; finished results stay visible.
    pub fn capture_stopped(&self) {
        self.transition_if(PipelinePhase::Capturing, PipelineState::Idle);
    }

    /// Run one recommendation cycle for `language`.
    ///
    /// Returns once the cycle reaches Ready or Failed, or right away when the
    /// trigger is ignored.
    pub async fn get_recommendation(&self, language: Language) -> TriggerOutcome {
        let (cycle_id, frame) = match self.begin_cycle(language) {
            Ok(started) => started,
            Err(reason) => {
                debug!(reason = reason.as_str(), "Recommendation trigger ignored");
                metrics::record_ignored_trigger(reason.as_str());
                return TriggerOutcome::Ignored { reason };
            }
        };

        info!(cycle_id = %cycle_id, language = %language, "Recommendation cycle started");
        let started = Instant::now();
        let guard = CycleGuard {
            state: &self.state,
            cycle_id: &cycle_id,
            started,
            settled: false,
        };
        let outcome = self.run_cycle(&cycle_id, language, &frame).await;
        guard.settle();

        let (label, emotion) = match &outcome {
            TriggerOutcome::Ready { emotion, .. } => ("ready", emotion.emotion.as_str()),
            _ => ("failed", "none"),
        };
        metrics::record_cycle(label, emotion, started.elapsed());
        outcome
    }

    /// Claim the pipeline for a new cycle and grab the frame to classify.
    fn begin_cycle(&self, language: Language) -> Result<(String, Frame), IgnoreReason> {
        if self.state.borrow().is_in_flight() {
            return Err(IgnoreReason::CycleInFlight);
        }
        if !self.capture.is_active() {
            return Err(IgnoreReason::CaptureInactive);
        }
        let frame = self
            .capture
            .current_frame()
            .filter(|frame| !frame.is_empty())
            .ok_or(IgnoreReason::NoFrame)?;

        let cycle_id = Uuid::new_v4().to_string();
        let mut claimed = Err(IgnoreReason::CycleInFlight);
        self.state.send_if_modified(|state| {
            if state.accepts_trigger() {
                *state = PipelineState::Detecting {
                    cycle_id: cycle_id.clone(),
                    language,
                };
                claimed = Ok(());
                true
            } else {
                if state.phase() == PipelinePhase::Idle {
                    claimed = Err(IgnoreReason::NotCapturing);
                }
                false
            }
        });
        claimed.map(|()| (cycle_id, frame))
    }

    async fn run_cycle(&self, cycle_id: &str, language: Language, frame: &Frame) -> TriggerOutcome {
        let classification = match within(
            self.call_deadline,
            self.classifier.classify(frame),
            ClassifierError::Timeout,
        )
        .await
        {
            Ok(classification) => classification,
            Err(e) => {
                warn!(cycle_id = %cycle_id, error = %e, "Expression classifier unavailable");
                return self.fail(cycle_id, FailureCause::ClassifierUnavailable);
            }
        };

        if classification == Classification::NoFaceFound {
            debug!(cycle_id = %cycle_id, "No face in frame, defaulting to neutral");
        }
        let emotion = map_detection(classification.distribution());
        debug!(
            cycle_id = %cycle_id,
            emotion = %emotion.emotion,
            confidence = emotion.confidence_percent,
            "Emotion detected"
        );

        self.advance(PipelineState::Recommending {
            cycle_id: cycle_id.to_string(),
            language,
            emotion,
        });

        let request = RecommendationRequest::new(emotion.emotion, language);
        let song = match within(
            self.call_deadline,
            self.recommender.recommend(&request),
            RecommendationFailure::Timeout,
        )
        .await
        {
            Ok(song) => song,
            Err(e) => {
                warn!(cycle_id = %cycle_id, error = %e, "Song recommendation failed");
                return self.fail(cycle_id, FailureCause::RecommendationFailure);
            }
        };

        info!(
            cycle_id = %cycle_id,
            emotion = %emotion.emotion,
            title = %song.title,
            artist = %song.artist,
            "Recommendation ready"
        );
        self.advance(PipelineState::Ready {
            cycle_id: cycle_id.to_string(),
            emotion,
            song: song.clone(),
            finished_at: chrono::Utc::now().timestamp_millis(),
        });
        TriggerOutcome::Ready { emotion, song }
    }

    fn fail(&self, cycle_id: &str, cause: FailureCause) -> TriggerOutcome {
        self.advance(PipelineState::Failed {
            cycle_id: cycle_id.to_string(),
            cause,
            notice: FAILURE_NOTICE.to_string(),
            finished_at: chrono::Utc::now().timestamp_millis(),
        });
        TriggerOutcome::Failed {
            notice: FAILURE_NOTICE.to_string(),
        }
    }

    /// Move the running cycle forward.
    fn advance(&self, next: PipelineState) {
        self.state.send_modify(|state| {
            if !state.phase().can_transition_to(next.phase()) {
                warn!(
                    from = ?state.phase(),
                    to = ?next.phase(),
                    "Unexpected pipeline transition"
                );
            }
            *state = next;
        });
    }

    fn transition_if(&self, from: PipelinePhase, next: PipelineState) {
        self.state.send_if_modified(|state| {
            if state.phase() == from {
                debug!(from = ?from, to = ?next.phase(), "Pipeline transition");
                *state = next;
                true
            } else {
                false
            }
        });
    }
}

/// Fails the cycle if its future is dropped before reaching Ready or Failed,
/// so an abandoned caller never leaves the pipeline in flight.
struct CycleGuard<'a> {
    state: &'a watch::Sender<PipelineState>,
    cycle_id: &'a str,
    started: Instant,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let abandoned = self.state.send_if_modified(|state| {
            let cause = match state {
                PipelineState::Detecting { cycle_id, .. } if cycle_id == self.cycle_id => {
                    FailureCause::ClassifierUnavailable
                }
                PipelineState::Recommending { cycle_id, .. } if cycle_id == self.cycle_id => {
                    FailureCause::RecommendationFailure
                }
                _ => return false,
            };
            *state = PipelineState::Failed {
                cycle_id: self.cycle_id.to_string(),
                cause,
                notice: FAILURE_NOTICE.to_string(),
                finished_at: chrono::Utc::now().timestamp_millis(),
            };
            true
        });
        if abandoned {
            warn!(cycle_id = %self.cycle_id, "Recommendation cycle abandoned by its caller");
            metrics::record_cycle("failed", "none", self.started.elapsed());
        }
    }
}

/// Await `call`, bounded by `deadline` when one is set.
async fn within<T, E>(
    deadline: Option<Duration>,
    call: impl Future<Output = Result<T, E>>,
    on_timeout: E,
) -> Result<T, E> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, call)
            .await
            .unwrap_or(Err(on_timeout)),
        None => call.await,
    }
}
