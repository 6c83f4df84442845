//! Emotion annotation service.
//!
//! Splits text into sentences, tags each sentence with Plutchik emotion
//! labels using a BERT classifier, and optionally groups the sentences by
//! literary character with the help of an LLM.

pub mod analysis;
pub mod config;
pub mod emotion;
pub mod llm_client;
pub mod segmentation;
pub mod server;

#[cfg(test)]
mod api_tests;

pub use analysis::{AnalysisError, CharacterJourneys, EmotionAnalyzer, SentenceEmotions};
pub use config::Config;
pub use emotion::{EmotionClassifier, EmotionConfig, EmotionError, EmotionLabel, EmotionProvider};
pub use llm_client::{CharacterExtractor, CharacterSentences, LLMClient, LlmConfig, LlmError};
pub use segmentation::{split_sentences, SentenceSplitter};
