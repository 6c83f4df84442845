use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::emotion::EmotionConfig;
use crate::llm_client::LlmConfig;

/// Environment variable holding the OpenRouter API key
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
/// Environment variable overriding the OpenRouter model
pub const ENV_MODEL: &str = "OPENROUTER_MODEL";
/// Environment variable overriding the OpenRouter base URL
pub const ENV_BASE_URL: &str = "OPENROUTER_BASE_URL";
/// Environment variable overriding the classifier model directory
pub const ENV_MODEL_DIR: &str = "EMOTION_MODEL_DIR";

/// Invalid configuration values
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("threshold must be between 0 and 1 (exclusive), got {0}")]
    InvalidThreshold(f32),

    #[error("max_len must be greater than zero")]
    InvalidMaxLen,

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("max_body_bytes must be greater than zero")]
    InvalidBodyLimit,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub server: ServerConfig,
    pub classifier: EmotionConfig,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            server: ServerConfig::default(),
            classifier: EmotionConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub const SCHEMA_VERSION: u32 = 1;

    /// Load config from file, or return defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to file (the API key is never written)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotion-annotator"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Overlay environment variables on top of the file values
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup (blank values are ignored)
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(dir) = get(ENV_MODEL_DIR) {
            self.classifier.model_dir = PathBuf::from(dir);
        }
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let threshold = self.classifier.threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.classifier.max_len == 0 {
            return Err(ConfigError::InvalidMaxLen);
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }
        Ok(())
    }
}
