//! Health endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    /// Descriptions of the active billing sources
    pub sources: Vec<String>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Healthy while at least one billing source is active
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let sources: Vec<String> = state
        .collector
        .sources()
        .iter()
        .map(|source| source.describe())
        .collect();

    let (status_code, status) = if sources.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Unhealthy)
    } else {
        (StatusCode::OK, HealthStatus::Healthy)
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        sources,
    };

    (status_code, Json(response))
}
