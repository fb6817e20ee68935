//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::buildinfo::BuildInfo;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    #[serde(flatten)]
    pub build: BuildInfo,
    pub uptime_secs: u64,
    pub snapshot_index_loaded: bool,
}

/// GET /health
///
/// Health check endpoint for monitoring. Does not read the caller identity.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "harbour".to_string(),
        build: BuildInfo::current(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        snapshot_index_loaded: state.federation.snapshots().index().is_loaded(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
