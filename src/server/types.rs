//! Request and response bodies for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /analyze` and `POST /analyze_characters`
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Missing or null text is treated as empty
    #[serde(default)]
    pub text: Option<String>,
}

impl AnalyzeRequest {
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

/// Error body returned on any failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /health` response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub classifier_ready: bool,
    pub llm_configured: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// An error that renders as `{"error": "..."}` with a status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
