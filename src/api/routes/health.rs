//! Health Routes
//!
//! - GET /health - Service status

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::api::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` once a report exists, `starting` before that
    pub status: String,
    pub broker_running: bool,
    pub subscribers: usize,
    pub last_report_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub version: String,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let last_report_at = state.latest_report().map(|r| r.built_at);
    let status = if last_report_at.is_some() {
        "healthy"
    } else {
        "starting"
    };

    Json(HealthResponse {
        status: status.to_string(),
        broker_running: state.broker.is_running().await,
        subscribers: state.broker.subscriber_count().await,
        last_report_at,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
