//! HTTP API for emotion annotation.
//!
//! ## Routes
//!
//! - `POST /analyze` - per-sentence emotions for a text
//! - `POST /analyze_characters` - per-character emotional journeys
//! - `GET /health` - readiness of the classifier and LLM client
//!
//! Both analysis routes take a JSON body:
//!
//! ```json
//! { "text": "Alice smiled. Bob frowned." }
//! ```
//!
//! Failures are reported as `{"error": "..."}`.

mod handlers;
mod server;
mod types;

pub use server::{build_router, start_server, AppState};
pub use types::{AnalyzeRequest, ErrorResponse, HealthResponse};
