//! Sentence and character emotion analysis.
//!
//! Ties the pieces together: split text into sentences, classify each one,
//! and (for character analysis) classify the sentences the LLM attributed to
//! each character.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

use crate::emotion::{EmotionClassifier, EmotionError, EmotionLabel};
use crate::llm_client::{CharacterExtractor, CharacterSentences, LlmError};
use crate::segmentation::SentenceSplitter;

/// Errors from an analysis request
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Classifier(#[from] EmotionError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Emotion classifier is unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

/// A sentence and the emotions assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceEmotions {
    pub sentence: String,
    pub emotions: Vec<EmotionLabel>,
}

/// Each character's emotional journey, keyed by character name
pub type CharacterJourneys = BTreeMap<String, Vec<SentenceEmotions>>;

/// Runs the classifier over sentences
pub struct EmotionAnalyzer {
    classifier: Mutex<Box<dyn EmotionClassifier>>,
    splitter: SentenceSplitter,
}

impl EmotionAnalyzer {
    pub fn new<C: EmotionClassifier + 'static>(classifier: C) -> Self {
        Self::from_boxed(Box::new(classifier))
    }

    pub fn from_boxed(classifier: Box<dyn EmotionClassifier>) -> Self {
        Self {
            classifier: Mutex::new(classifier),
            splitter: SentenceSplitter::default(),
        }
    }

    pub fn with_splitter(mut self, splitter: SentenceSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Whether the underlying classifier can serve requests
    pub fn is_ready(&self) -> bool {
        self.classifier
            .lock()
            .map(|classifier| classifier.is_ready())
            .unwrap_or(false)
    }

    /// Classify each non-blank sentence, keeping input order and text
    pub fn annotate<'a, I>(&self, sentences: I) -> Result<Vec<SentenceEmotions>, AnalysisError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classifier = self
            .classifier
            .lock()
            .map_err(|e| AnalysisError::ClassifierUnavailable(e.to_string()))?;

        let mut results = Vec::new();
        for sentence in sentences {
            if sentence.trim().is_empty() {
                continue;
            }
            let emotions = classifier.classify(sentence)?;
            results.push(SentenceEmotions {
                sentence: sentence.to_string(),
                emotions,
            });
        }
        Ok(results)
    }

    /// Split text into sentences and classify each one
    pub fn analyze_text(&self, text: &str) -> Result<Vec<SentenceEmotions>, AnalysisError> {
        let sentences = self.splitter.split(text);
        debug!("Split {} chars into {} sentences", text.len(), sentences.len());
        self.annotate(sentences)
    }

    /// Classify the sentences attributed to each character.
    ///
    /// Characters left with no non-blank sentence are omitted.
    pub fn build_journeys(
        &self,
        partition: &CharacterSentences,
    ) -> Result<CharacterJourneys, AnalysisError> {
        let mut journeys = CharacterJourneys::new();
        for (character, sentences) in partition {
            let journey = self.annotate(sentences.iter().map(String::as_str))?;
            if journey.is_empty() {
                debug!("Dropping character {} with no usable sentences", character);
                continue;
            }
            journeys.insert(character.clone(), journey);
        }
        Ok(journeys)
    }
}

/// Per-sentence analysis on the blocking pool
pub async fn analyze_text(
    analyzer: Arc<EmotionAnalyzer>,
    text: String,
) -> Result<Vec<SentenceEmotions>, AnalysisError> {
    let results = tokio::task::spawn_blocking(move || analyzer.analyze_text(&text))
        .await
        .map_err(|e| AnalysisError::TaskFailed(e.to_string()))??;
    info!("Analyzed {} sentences", results.len());
    Ok(results)
}

/// Partition text by character with the LLM, then classify each journey.
///
/// Blank text short-circuits to an empty result without calling the LLM.
pub async fn analyze_characters(
    analyzer: Arc<EmotionAnalyzer>,
    extractor: &dyn CharacterExtractor,
    text: &str,
) -> Result<CharacterJourneys, AnalysisError> {
    if text.trim().is_empty() {
        return Ok(CharacterJourneys::new());
    }

    let partition = extractor.extract_characters(text).await?;

    let journeys = tokio::task::spawn_blocking(move || analyzer.build_journeys(&partition))
        .await
        .map_err(|e| AnalysisError::TaskFailed(e.to_string()))??;
    info!("Built emotional journeys for {} characters", journeys.len());
    Ok(journeys)
}
