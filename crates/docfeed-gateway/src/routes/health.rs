//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Collections known to the store.
    pub collections: Vec<String>,
    /// Change feed sessions currently streaming.
    pub active_sessions: usize,
}

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let collections = state.store.collections();
    let healthy = collections.iter().any(|c| c == &state.config.collection);

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        collections,
        active_sessions: state.active_sessions(),
    })
}
