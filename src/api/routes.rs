//! Dashboard routes
//!
//! - `GET /api/measurements?range=...` - bucketed series for the range
//! - `GET /api/measurements/latest` - newest reading plus temperature trend

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::storage::{LatestSnapshot, Range, SeriesPoint};

/// Query parameters for the series endpoint.
#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    /// Absent or unrecognized values mean all-time
    #[serde(default)]
    pub range: Option<String>,
}

/// GET /api/measurements
pub async fn get_measurements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<Vec<SeriesPoint>>> {
    let range = Range::parse(params.range.as_deref().unwrap_or(""));
    let series = state.engine.ranged_series(range)?;
    Ok(Json(series))
}

/// GET /api/measurements/latest
pub async fn get_latest(State(state): State<Arc<AppState>>) -> ApiResult<Json<LatestSnapshot>> {
    let snapshot = state.engine.latest_with_trajectory()?;
    Ok(Json(snapshot))
}
