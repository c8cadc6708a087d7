//! Facial expression vocabulary and the expression-to-emotion mapping policy.
//!
//! The classifier speaks in seven raw expression labels. Recommendations only
//! need four coarse emotions, so every raw label folds into one of them
//! through a fixed total table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Raw expression label as produced by the classifier.
///
/// Declaration order doubles as the tie-break priority of the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionLabel {
    Happy,
    Sad,
    Neutral,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl ExpressionLabel {
    pub const ALL: [ExpressionLabel; 7] = [
        ExpressionLabel::Happy,
        ExpressionLabel::Sad,
        ExpressionLabel::Neutral,
        ExpressionLabel::Angry,
        ExpressionLabel::Fearful,
        ExpressionLabel::Disgusted,
        ExpressionLabel::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionLabel::Happy => "happy",
            ExpressionLabel::Sad => "sad",
            ExpressionLabel::Neutral => "neutral",
            ExpressionLabel::Angry => "angry",
            ExpressionLabel::Fearful => "fearful",
            ExpressionLabel::Disgusted => "disgusted",
            ExpressionLabel::Surprised => "surprised",
        }
    }

    /// The coarse emotion this raw label folds into.
    pub fn coarse(&self) -> CoarseEmotion {
        match self {
            ExpressionLabel::Happy | ExpressionLabel::Surprised => CoarseEmotion::Happy,
            ExpressionLabel::Sad | ExpressionLabel::Fearful => CoarseEmotion::Sad,
            ExpressionLabel::Neutral => CoarseEmotion::Neutral,
            ExpressionLabel::Angry | ExpressionLabel::Disgusted => CoarseEmotion::Angry,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ExpressionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduced emotion vocabulary used to ask for a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoarseEmotion {
    Happy,
    Sad,
    Neutral,
    Angry,
}

impl CoarseEmotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoarseEmotion::Happy => "happy",
            CoarseEmotion::Sad => "sad",
            CoarseEmotion::Neutral => "neutral",
            CoarseEmotion::Angry => "angry",
        }
    }
}

impl fmt::Display for CoarseEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DistributionError {
    #[error("Missing score for expression '{0}'")]
    MissingLabel(ExpressionLabel),
}

/// Scores for every raw expression label.
///
/// Always complete: construction fails if any of the seven labels is absent.
/// Scores are relative and need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionDistribution {
    scores: [f32; 7],
}

impl ExpressionDistribution {
    /// Build a distribution from scores listed in declaration order.
    pub fn new(scores: [f32; 7]) -> Self {
        Self { scores }
    }

    /// Build a distribution from a label-keyed map, as sent by classifiers.
    ///
    /// Unknown keys are ignored, missing labels are rejected.
    pub fn from_scores(scores: &HashMap<String, f32>) -> Result<Self, DistributionError> {
        let mut values = [0.0f32; 7];
        for label in ExpressionLabel::ALL {
            values[label.index()] = *scores
                .get(label.as_str())
                .ok_or(DistributionError::MissingLabel(label))?;
        }
        Ok(Self { scores: values })
    }

    pub fn score(&self, label: ExpressionLabel) -> f32 {
        self.scores[label.index()]
    }

    /// The label with the strictly greatest score; ties go to the label
    /// declared first.
    pub fn dominant(&self) -> (ExpressionLabel, f32) {
        let mut best = (ExpressionLabel::ALL[0], self.scores[0]);
        for label in ExpressionLabel::ALL.into_iter().skip(1) {
            let score = self.score(label);
            if score > best.1 || (best.1.is_nan() && !score.is_nan()) {
                best = (label, score);
            }
        }
        best
    }
}

/// Coarse emotion plus the winning raw score as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionResult {
    pub emotion: CoarseEmotion,
    pub confidence_percent: u8,
}

impl EmotionResult {
    /// Stand-in result used when no face was found in the frame.
    pub const NO_FACE_DEFAULT: EmotionResult = EmotionResult {
        emotion: CoarseEmotion::Neutral,
        confidence_percent: 0,
    };

    /// True when this value is indistinguishable from the no-face default.
    pub fn is_no_face_default(&self) -> bool {
        *self == Self::NO_FACE_DEFAULT
    }
}

/// Fold a complete distribution into an [`EmotionResult`].
pub fn map_distribution(distribution: &ExpressionDistribution) -> EmotionResult {
    let (label, score) = distribution.dominant();
    EmotionResult {
        emotion: label.coarse(),
        confidence_percent: confidence_percent(score),
    }
}

/// Fold a classification outcome; `None` means no face was found.
pub fn map_detection(distribution: Option<&ExpressionDistribution>) -> EmotionResult {
    match distribution {
        Some(distribution) => map_distribution(distribution),
        None => EmotionResult::NO_FACE_DEFAULT,
    }
}

fn confidence_percent(score: f32) -> u8 {
    if !score.is_finite() {
        // Infinity still carries a direction, NaN does not.
        return if score == f32::INFINITY { 100 } else { 0 };
    }
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}
