//! Route handlers for the emotion API.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::analysis::{self, CharacterJourneys, SentenceEmotions};

use super::server::AppState;
use super::types::{AnalyzeRequest, ApiError, HealthResponse};

/// Process start time for uptime reporting
static APP_START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup)
pub fn init_start_time() {
    APP_START_TIME.get_or_init(Instant::now);
}

fn get_uptime_seconds() -> u64 {
    APP_START_TIME
        .get()
        .map(|t| t.elapsed().as_secs())
        .unwrap_or(0)
}

/// Turn a body rejection into a JSON error with the extractor's status
fn read_request(payload: Result<Json<AnalyzeRequest>, JsonRejection>) -> Result<String, ApiError> {
    match payload {
        Ok(Json(req)) => Ok(req.into_text()),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::new(rejection.status(), rejection.body_text()))
        }
    }
}

/// `POST /analyze`: per-sentence emotions for the whole text
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Vec<SentenceEmotions>>, ApiError> {
    let text = read_request(payload)?;
    info!("Analyze request: {} chars", text.len());

    match analysis::analyze_text(state.analyzer.clone(), text).await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            error!("Sentence analysis failed: {:?}", e);
            Err(ApiError::internal("An internal error occurred."))
        }
    }
}

/// `POST /analyze_characters`: emotional journey per character
pub async fn analyze_characters(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<CharacterJourneys>, ApiError> {
    let text = read_request(payload)?;
    info!("Character analysis request: {} chars", text.len());

    match analysis::analyze_characters(state.analyzer.clone(), state.extractor.as_ref(), &text)
        .await
    {
        Ok(journeys) => Ok(Json(journeys)),
        Err(e) => {
            error!("Character analysis failed: {:?}", e);
            Err(ApiError::internal(format!(
                "An internal error occurred: {}",
                e
            )))
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let classifier_ready = state.analyzer.is_ready();
    Json(HealthResponse {
        healthy: classifier_ready,
        classifier_ready,
        llm_configured: state.extractor.is_configured(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: get_uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
