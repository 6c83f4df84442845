//! Emotion classification module.
//!
//! Sentences are scored by a fine-tuned BERT sequence classifier exported to
//! ONNX. The model emits one logit per label; after a sigmoid, every label
//! whose probability clears the threshold is assigned (multi-label).

mod labels;
mod provider;

pub use labels::{labels_above_threshold, sigmoid, EmotionLabel};
pub use provider::{EmotionClassifier, EmotionConfig, EmotionError, EmotionProvider};
