//! HTTP server for the emotion API.

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::analysis::EmotionAnalyzer;
use crate::config::ServerConfig;
use crate::llm_client::CharacterExtractor;

use super::handlers;

/// Shared state for the route handlers
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<EmotionAnalyzer>,
    pub extractor: Arc<dyn CharacterExtractor>,
}

impl AppState {
    pub fn new(analyzer: EmotionAnalyzer, extractor: impl CharacterExtractor + 'static) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            extractor: Arc::new(extractor),
        }
    }
}

/// Build the router with CORS for the browser frontend.
///
/// Oversized bodies surface as a `Json` rejection, so they get the same
/// `{"error": ...}` body as other malformed requests.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/analyze_characters", post(handlers::analyze_characters))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until Ctrl+C
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    handlers::init_start_time();

    let app = build_router(state, config.max_body_bytes);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", addr))?;

    info!("Emotion API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}
