use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use emotion_annotator::config::Config;
use emotion_annotator::server::{start_server, AppState};
use emotion_annotator::{EmotionAnalyzer, EmotionProvider, LLMClient};

/// HTTP service that tags text with per-sentence emotion labels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON config file (default: ~/.emotion-annotator/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory containing model.onnx and tokenizer.json
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Probability a label must exceed to be assigned (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.model_dir {
            config.classifier.model_dir = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.classifier.threshold = threshold;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A missing .env is fine, the variables may come from the environment
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    config.apply_env();
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!("Emotion annotator starting...");
    info!("Classifier model dir: {:?}", config.classifier.model_dir);
    info!("LLM model: {}", config.llm.model);

    let provider = match EmotionProvider::new(config.classifier.clone()) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to load emotion model: {}", e);
            eprintln!("\nThe emotion classifier could not be loaded: {}", e);
            eprintln!("\nExpected files:");
            eprintln!("  {:?}", config.classifier.model_path());
            eprintln!("  {:?}", config.classifier.tokenizer_path());
            eprintln!("\nExport the fine-tuned BERT classifier to ONNX (inputs input_ids and");
            eprintln!("attention_mask, output logits) and save its tokenizer.json alongside it,");
            eprintln!("or point to another directory with --model-dir.");
            return Err(e).context("Failed to load emotion model");
        }
    };

    let llm_client = LLMClient::new(&config.llm).context("Failed to create LLM client")?;

    let state = AppState::new(EmotionAnalyzer::new(provider), llm_client);
    start_server(&config.server, state).await
}
