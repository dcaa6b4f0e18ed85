use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Normal,
    Pneumonia,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Normal, Label::Pneumonia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Pneumonia => "PNEUMONIA",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the decision rule. Only [`classify`] builds one, so `label`,
/// `confidence` and `raw_score` always agree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    label: Label,
    confidence: f64,
    raw_score: f32,
}

impl ClassificationResult {
    pub fn label(&self) -> Label {
        self.label
    }

    /// Percentage in [0, 100], rounded to two decimals.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn raw_score(&self) -> f32 {
        self.raw_score
    }

    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

const DECISION_THRESHOLD: f32 = 0.5;

/// Maps a sigmoid score to a label and confidence. A score of exactly 0.5
/// resolves to NORMAL.
pub fn classify(score: f32) -> ClassificationResult {
    let score = if score.is_nan() {
        DECISION_THRESHOLD
    } else {
        score.clamp(0.0, 1.0)
    };
    let probability = f64::from(score);

    let (label, winning) = if score > DECISION_THRESHOLD {
        (Label::Pneumonia, probability)
    } else {
        (Label::Normal, 1.0 - probability)
    };

    ClassificationResult {
        label,
        confidence: round_to_hundredths(winning * 100.0),
        raw_score: score,
    }
}

pub(crate) fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
