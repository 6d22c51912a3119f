//! Diff Route
//!
//! - GET /diff - Latest report as JSON

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// GET /diff
///
/// Returns `{"minute": .., "hour": .., "day": ..}`, or 503 until the first
/// refresh cycle has completed.
pub async fn latest_diff(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let report = state.latest_report().ok_or(ApiError::NotReady)?;
    let body = report.to_json()?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}
