//! Health check handlers for service monitoring.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Peripherals currently in the activity directory
    pub visible_peripherals: usize,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
}

/// Health check endpoint handler.
///
/// Everything is in memory, so reaching the handler means the service is
/// healthy. Called frequently by orchestrators, so it stays cheap.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        timestamp: app_state.clock.now(),
        visible_peripherals: app_state.directory.quantity(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    debug!(visible = response.visible_peripherals, "Health check completed");

    (StatusCode::OK, Json(response))
}

/// Liveness check endpoint for container probes.
#[instrument(name = "liveness_check", skip(app_state))]
pub async fn liveness_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": app_state.clock.now(),
        "service": "beagle-api"
    });

    (StatusCode::OK, Json(response))
}
