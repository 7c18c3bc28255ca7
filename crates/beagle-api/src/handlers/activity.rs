//! Paginated listing of the activity directory.

use axum::{
    extract::{Query, State},
    Json,
};
use beagle_activity::Record;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::AppState;

/// Pagination parameters for `GET /activity`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ActivityQuery {
    /// Maximum number of items. `0` or absent means all.
    #[serde(default)]
    pub take: usize,
    /// Number of items to skip.
    #[serde(default)]
    pub skip: usize,
}

/// Response body of `GET /activity`.
#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    /// Total number of visible peripherals, regardless of pagination.
    pub quantity: usize,
    /// Requested page, ascending by key.
    pub items: Vec<Record>,
}

/// Lists visible peripherals.
#[instrument(name = "list_activity", skip(app_state))]
pub async fn list_activity(
    State(app_state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Json<ActivityResponse> {
    let items = app_state.directory.records(query.take, query.skip);
    let quantity = app_state.directory.quantity();

    debug!(quantity, returned = items.len(), "Listed activity");

    Json(ActivityResponse { quantity, items })
}
