//! Emotion classification provider using an ONNX export of a BERT
//! multi-label sequence classifier.
//!
//! The model directory must contain the ONNX graph (inputs `input_ids` and
//! `attention_mask`, output `logits` of shape `[1, 8]`) and the matching
//! HuggingFace `tokenizer.json`.

#[cfg(feature = "onnx")]
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
#[cfg(feature = "onnx")]
use tokenizers::{PaddingStrategy, Tokenizer, TruncationParams};

use super::labels::EmotionLabel;
#[cfg(feature = "onnx")]
use super::labels::{labels_above_threshold, sigmoid};

/// Errors that can occur during emotion classification
#[derive(Debug, Error)]
pub enum EmotionError {
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature not enabled")]
    FeatureNotEnabled,
}

/// Configuration for the emotion classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Directory holding the model and tokenizer files
    pub model_dir: PathBuf,
    /// ONNX graph file name inside `model_dir`
    pub model_file: String,
    /// Tokenizer file name inside `model_dir`
    pub tokenizer_file: String,
    /// Sequence length the model was trained with (inputs are padded/truncated to it)
    pub max_len: usize,
    /// Probability a label must exceed to be assigned
    pub threshold: f32,
    /// Number of threads for ONNX inference
    pub n_threads: usize,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("saved_models"),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            max_len: 128,
            threshold: 0.5,
            n_threads: 1,
        }
    }
}

impl EmotionConfig {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join(&self.tokenizer_file)
    }
}

/// Anything that can assign emotion labels to a single sentence.
///
/// Implementations may keep mutable inference state, so callers serialize
/// access (see [`crate::analysis::EmotionAnalyzer`]).
pub trait EmotionClassifier: Send {
    fn classify(&mut self, sentence: &str) -> Result<Vec<EmotionLabel>, EmotionError>;

    fn is_ready(&self) -> bool {
        true
    }
}

/// Emotion classification provider backed by ONNX Runtime
#[cfg(feature = "onnx")]
pub struct EmotionProvider {
    session: Session,
    tokenizer: Tokenizer,
    config: EmotionConfig,
}

#[cfg(feature = "onnx")]
impl EmotionProvider {
    /// Create a new emotion provider
    pub fn new(config: EmotionConfig) -> Result<Self, EmotionError> {
        if config.max_len == 0 {
            return Err(EmotionError::InvalidInput(
                "max_len must be greater than zero".to_string(),
            ));
        }

        let model_path = config.model_path();
        if !model_path.exists() {
            return Err(EmotionError::ModelLoadError(format!(
                "Model not found at {:?}",
                model_path
            )));
        }

        let tokenizer_path = config.tokenizer_path();
        if !tokenizer_path.exists() {
            return Err(EmotionError::ModelLoadError(format!(
                "Tokenizer not found at {:?}",
                tokenizer_path
            )));
        }

        let tokenizer = load_tokenizer(&tokenizer_path, config.max_len)?;

        let session = Session::builder()
            .map_err(|e: ort::Error| EmotionError::ModelLoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| EmotionError::ModelLoadError(e.to_string()))?
            .with_intra_threads(config.n_threads.max(1))
            .map_err(|e: ort::Error| EmotionError::ModelLoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| EmotionError::ModelLoadError(e.to_string()))?;

        tracing::info!(
            "Emotion provider initialized with model: {:?} (max_len={}, threshold={})",
            model_path,
            config.max_len,
            config.threshold
        );

        Ok(Self {
            session,
            tokenizer,
            config,
        })
    }

    /// Per-label probabilities for a sentence, indexed like [`EmotionLabel::ALL`]
    pub fn probabilities(&mut self, sentence: &str) -> Result<Vec<f32>, EmotionError> {
        if sentence.trim().is_empty() {
            return Err(EmotionError::InvalidInput("Sentence is empty".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(sentence, true)
            .map_err(|e| EmotionError::TokenizerError(e.to_string()))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        if input_ids.len() != self.config.max_len {
            return Err(EmotionError::TokenizerError(format!(
                "Expected {} tokens after padding, got {}",
                self.config.max_len,
                input_ids.len()
            )));
        }

        // BERT expects input shape [batch, seq_len]
        let input_shape = [1_usize, self.config.max_len];

        let ids_tensor = Value::from_array((input_shape, input_ids))
            .map_err(|e: ort::Error| EmotionError::InferenceError(e.to_string()))?;
        let mask_tensor = Value::from_array((input_shape, attention_mask))
            .map_err(|e: ort::Error| EmotionError::InferenceError(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor
            ])
            .map_err(|e: ort::Error| EmotionError::InferenceError(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| EmotionError::InferenceError("No output from model".to_string()))?;

        let logits = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| EmotionError::InferenceError(e.to_string()))?;

        let probs: Vec<f32> = logits.1.iter().map(|&logit| sigmoid(logit)).collect();

        if probs.len() != EmotionLabel::ALL.len() {
            return Err(EmotionError::InferenceError(format!(
                "Unexpected output size from emotion model: {} (expected {})",
                probs.len(),
                EmotionLabel::ALL.len()
            )));
        }

        Ok(probs)
    }

    pub fn config(&self) -> &EmotionConfig {
        &self.config
    }
}

#[cfg(feature = "onnx")]
impl EmotionClassifier for EmotionProvider {
    fn classify(&mut self, sentence: &str) -> Result<Vec<EmotionLabel>, EmotionError> {
        let probs = self.probabilities(sentence)?;
        let labels = labels_above_threshold(&probs, self.config.threshold);

        tracing::debug!(
            "Classified {} chars -> {:?} (max p={:.2})",
            sentence.len(),
            labels,
            probs.iter().copied().fold(0.0_f32, f32::max)
        );

        Ok(labels)
    }
}

/// Load the tokenizer and pin it to fixed-length padding and truncation
#[cfg(feature = "onnx")]
fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer, EmotionError> {
    let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
        EmotionError::TokenizerError(format!("Failed to load tokenizer at {:?}: {}", path, e))
    })?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| EmotionError::TokenizerError(e.to_string()))?;

    // Keep the pad token from tokenizer.json, only force the length
    let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
    padding.strategy = PaddingStrategy::Fixed(max_len);
    tokenizer.with_padding(Some(padding));

    Ok(tokenizer)
}

// Stub implementation when feature is not enabled
#[cfg(not(feature = "onnx"))]
pub struct EmotionProvider;

#[cfg(not(feature = "onnx"))]
impl EmotionProvider {
    pub fn new(_config: EmotionConfig) -> Result<Self, EmotionError> {
        Err(EmotionError::FeatureNotEnabled)
    }
}

#[cfg(not(feature = "onnx"))]
impl EmotionClassifier for EmotionProvider {
    fn classify(&mut self, _sentence: &str) -> Result<Vec<EmotionLabel>, EmotionError> {
        Err(EmotionError::FeatureNotEnabled)
    }

    fn is_ready(&self) -> bool {
        false
    }
}
