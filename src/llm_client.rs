//! OpenRouter API client for character extraction
//!
//! This module talks to the OpenAI-compatible chat-completions endpoint on
//! OpenRouter. The model is asked to identify the main characters of a text
//! and list the sentences that mention each one; the reply is expected to be
//! a JSON object keyed by character name.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default OpenRouter API root (the `/v1/...` paths are appended)
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api";

/// Default model for character extraction
pub const DEFAULT_MODEL: &str = "mistralai/mistral-7b-instruct:free";

/// Default timeout for LLM API requests (2 minutes for generation)
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff delay
const MAX_BACKOFF_MS: u64 = 5000;

const CHARACTER_SYSTEM_PROMPT: &str = "You are a literary analyst. Your task is to identify main characters from a transcript and extract all sentences related to each. Your output must be a valid JSON object only, with no other text, explanations, or markdown formatting like ```json.";

/// Sentences attributed to each character, keyed by character name
pub type CharacterSentences = BTreeMap<String, Vec<String>>;

/// Errors from the LLM client
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENROUTER_API_KEY not found in environment")]
    MissingApiKey,

    #[error("Invalid LLM configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to OpenRouter: {0}")]
    Request(String),

    #[error("OpenRouter API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("No response choices returned")]
    EmptyResponse,

    #[error("{0}")]
    InvalidResponse(String),
}

/// Settings for the OpenRouter connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    pub app_referer: Option<String>,
    /// Sent as `X-Title` for OpenRouter app attribution
    pub app_title: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            app_referer: None,
            app_title: None,
        }
    }
}

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    #[allow(dead_code)]
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

/// Source of a character → sentences partition for a text
#[async_trait]
pub trait CharacterExtractor: Send + Sync {
    async fn extract_characters(&self, text: &str) -> Result<CharacterSentences, LlmError>;

    /// Whether the extractor has what it needs to make requests
    fn is_configured(&self) -> bool {
        true
    }
}

/// OpenRouter chat-completions client
#[derive(Debug)]
pub struct LLMClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
    app_referer: Option<String>,
    app_title: Option<String>,
}

/// Check if a reqwest error is retryable (transient network issues)
fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    if let Some(status) = err.status() {
        return is_retryable_status(status);
    }
    false
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Calculate backoff delay with exponential increase and jitter
fn calculate_backoff(attempt: u32) -> Duration {
    let base_delay = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = base_delay.min(MAX_BACKOFF_MS);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_millis() as u64)
        % 100;
    Duration::from_millis(capped_delay + jitter)
}

impl LLMClient {
    /// Create a new client with URL validation.
    ///
    /// A missing API key is accepted here; requests fail with
    /// [`LlmError::MissingApiKey`] until one is configured.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let cleaned_url = config.base_url.trim().trim_end_matches('/');

        // Validate URL format and scheme
        let parsed = reqwest::Url::parse(cleaned_url).map_err(|e| {
            LlmError::InvalidConfig(format!("Invalid LLM base URL '{}': {}", cleaned_url, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LlmError::InvalidConfig(format!(
                "LLM base URL must use http or https scheme, got: {}",
                parsed.scheme()
            )));
        }

        // Reject URLs with credentials, the key belongs in the header
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(LlmError::InvalidConfig(
                "LLM base URL must not contain credentials".to_string(),
            ));
        }

        if config.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig(
                "Model name cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        if api_key.is_none() {
            warn!("No OpenRouter API key configured; character analysis will fail until one is set");
        }

        info!("LLMClient created for {} (model {})", cleaned_url, config.model);

        Ok(Self {
            client,
            base_url: cleaned_url.to_string(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries.max(1),
            app_referer: config.app_referer.clone(),
            app_title: config.app_title.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build authentication headers for requests
    fn auth_headers(&self) -> Result<HeaderMap, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let mut headers = HeaderMap::new();

        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            LlmError::InvalidConfig("API key contains invalid header characters".to_string())
        })?;
        headers.insert(AUTHORIZATION, bearer);

        if let Some(referer) = &self.app_referer {
            if let Ok(value) = HeaderValue::from_str(referer) {
                headers.insert("HTTP-Referer", value);
            }
        }

        if let Some(title) = &self.app_title {
            if let Ok(value) = HeaderValue::from_str(title) {
                headers.insert("X-Title", value);
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Generate text using the LLM with retry logic
    pub async fn generate(&self, system_prompt: &str, user_content: &str) -> Result<String, LlmError> {
        if user_content.trim().is_empty() {
            return Err(LlmError::InvalidConfig(
                "User content cannot be empty".to_string(),
            ));
        }

        let headers = self.auth_headers()?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Generating with LLM model {} at {}", self.model, url);

        let mut messages = Vec::new();

        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        let mut last_error = LlmError::EmptyResponse;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    "LLM generate attempt {} failed ({}), retrying in {:?}",
                    attempt, last_error, backoff
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    if is_retryable_error(&e) {
                        last_error = LlmError::Request(e.to_string());
                        continue;
                    }
                    return Err(LlmError::Request(e.to_string()));
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let err = LlmError::Status {
                    status: status.as_u16(),
                    body,
                };
                if is_retryable_status(status) {
                    last_error = err;
                    continue;
                }
                error!("LLM generate failed: {}", err);
                return Err(err);
            }

            let chat_response = response.json::<ChatCompletionResponse>().await.map_err(|e| {
                LlmError::InvalidResponse(format!("Failed to parse LLM response: {}", e))
            })?;

            return chat_response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or(LlmError::EmptyResponse);
        }

        error!(
            "LLM generate failed after {} attempts: {}",
            self.max_retries, last_error
        );
        Err(last_error)
    }

    /// Ask the model for the main characters and their sentences
    pub async fn extract_characters(&self, text: &str) -> Result<CharacterSentences, LlmError> {
        if self.api_key.is_none() {
            return Err(LlmError::MissingApiKey);
        }

        info!(
            "Extracting characters with model {} from {} chars",
            self.model,
            text.len()
        );

        let user_content = build_character_user_prompt(text);
        let response = self.generate(CHARACTER_SYSTEM_PROMPT, &user_content).await?;

        debug!("Raw LLM response ({} chars):\n{}", response.len(), response);

        let json = extract_json_object(&response).ok_or_else(|| {
            warn!(
                "No JSON object in LLM response: {:?}",
                &response[..floor_char_boundary(&response, 200)]
            );
            LlmError::InvalidResponse("LLM did not return a valid JSON object.".to_string())
        })?;

        let characters = parse_character_sentences(&json)?;
        info!("LLM identified {} characters", characters.len());
        Ok(characters)
    }
}

#[async_trait]
impl CharacterExtractor for LLMClient {
    async fn extract_characters(&self, text: &str) -> Result<CharacterSentences, LlmError> {
        LLMClient::extract_characters(self, text).await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Build the user turn asking for the character → sentences object
fn build_character_user_prompt(text: &str) -> String {
    format!(
        "Analyze the transcript below. Identify main characters and provide a list of sentences for each. The output must be a JSON object where each key is a character's name and the value is a list of sentences mentioning them.\n\nTranscript:\n\"\"\"\n{}\n\"\"\"\n\nJSON output only:",
        text
    )
}

/// Largest char boundary not beyond `max`, for log previews
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Remove <think>...</think> reasoning blocks some models emit before answering
fn strip_think_blocks(response: &str) -> String {
    let mut text = response.to_string();
    while let Some(start) = text.find("<think>") {
        if let Some(end) = text[start..].find("</think>") {
            let end_pos = start + end + "</think>".len();
            text = format!("{}{}", &text[..start], &text[end_pos..]);
        } else {
            // No closing tag, the answer never started
            text.truncate(start);
            break;
        }
    }
    text
}

/// Fix unescaped newlines inside JSON strings
/// LLMs sometimes produce JSON with literal newlines in strings which is invalid
fn fix_json_newlines(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;

    for ch in json.chars() {
        if escape_next {
            result.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                result.push(ch);
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
                result.push(ch);
            }
            '\n' if in_string => result.push_str("\\n"),
            '\r' if in_string => {}
            '\t' if in_string => result.push_str("\\t"),
            _ => result.push(ch),
        }
    }

    result
}

/// Insert missing `]` before the final `}` when a list was cut off.
///
/// Returns `None` when the brackets already balance.
fn fix_unclosed_lists(json: &str) -> Option<String> {
    let mut bracket_count = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for ch in json.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' if !in_string => bracket_count += 1,
            ']' if !in_string => bracket_count -= 1,
            _ => {}
        }
    }

    if bracket_count <= 0 {
        return None;
    }

    let trimmed = json.trim_end();
    let last_brace = trimmed.rfind('}')?;
    let mut repaired = trimmed[..last_brace].trim_end().to_string();
    if repaired.ends_with(',') {
        repaired.pop();
    }
    for _ in 0..bracket_count {
        repaired.push(']');
    }
    repaired.push('}');
    Some(repaired)
}

/// Locate the JSON object in an LLM reply.
///
/// Reasoning blocks and markdown code fences are removed, then everything from
/// the first `{` to the last `}` is taken, so surrounding prose is ignored.
pub fn extract_json_object(response: &str) -> Option<String> {
    let text = strip_think_blocks(response)
        .replace("```json", "")
        .replace("```", "");
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(fix_json_newlines(&text[start..=end]))
}

/// Turn a JSON object reply into the character → sentences partition.
///
/// Each value should be a list of sentences. A bare string counts as a single
/// sentence; anything else is skipped.
pub fn parse_character_sentences(json: &str) -> Result<CharacterSentences, LlmError> {
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(first_err) => {
            let repaired = fix_unclosed_lists(json).ok_or_else(|| {
                LlmError::InvalidResponse(format!("Failed to parse LLM JSON: {}", first_err))
            })?;
            debug!("Retrying LLM JSON parse after closing unterminated lists");
            serde_json::from_str(&repaired).map_err(|_| {
                LlmError::InvalidResponse(format!("Failed to parse LLM JSON: {}", first_err))
            })?
        }
    };

    let Value::Object(map) = value else {
        return Err(LlmError::InvalidResponse(
            "LLM JSON is not an object of character names".to_string(),
        ));
    };

    let mut characters = CharacterSentences::new();
    for (name, sentences) in map {
        let sentences = match sentences {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    other => {
                        warn!("Skipping non-string sentence for {}: {}", name, other);
                        None
                    }
                })
                .collect(),
            Value::String(s) => vec![s],
            other => {
                warn!("Skipping character {} with unexpected value: {}", name, other);
                continue;
            }
        };
        characters.insert(name, sentences);
    }

    Ok(characters)
}
