use serde::{Deserialize, Serialize};
use std::fmt;

/// Plutchik's eight basic emotions, in classifier output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Joy,
    Trust,
    Fear,
    Surprise,
    Sadness,
    Disgust,
    Anger,
    Anticipation,
}

impl EmotionLabel {
    /// All labels, indexed the same way as the model's logits
    pub const ALL: [EmotionLabel; 8] = [
        Self::Joy,
        Self::Trust,
        Self::Fear,
        Self::Surprise,
        Self::Sadness,
        Self::Disgust,
        Self::Anger,
        Self::Anticipation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Trust => "trust",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Sadness => "sadness",
            Self::Disgust => "disgust",
            Self::Anger => "anger",
            Self::Anticipation => "anticipation",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmotionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| format!("Unknown emotion label: {}", s))
    }
}

/// Logistic sigmoid
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Labels whose probability is strictly greater than `threshold`.
///
/// `probs` is indexed like [`EmotionLabel::ALL`]; extra values are ignored.
pub fn labels_above_threshold(probs: &[f32], threshold: f32) -> Vec<EmotionLabel> {
    EmotionLabel::ALL
        .iter()
        .zip(probs)
        .filter(|(_, &p)| p > threshold)
        .map(|(label, _)| *label)
        .collect()
}
