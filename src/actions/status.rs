//! Status endpoint: build information, uptime and live flight counts

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

use super::DataResponse;
use crate::web::AppState;

/// Server start time - initialized on first status request
static SERVER_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the server start time (call this when the server starts)
pub fn init_server_start_time() {
    SERVER_START_TIME.get_or_init(Instant::now);
}

/// Status response with build and runtime information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    /// Git version from `git describe --tags --always --dirty`
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
    pub uptime_seconds: u64,
    pub uptime_human: String,
    /// Records held, active or not
    pub tracked_flights: usize,
    pub active_flights: usize,
    pub stale_after_seconds: i64,
}

/// Uptime as `HH:MM:SS`, prefixed with whole days once past the first day
fn format_uptime(uptime: chrono::Duration) -> String {
    let days = uptime.num_days();
    let clock = format!(
        "{:02}:{:02}:{:02}",
        uptime.num_hours() % 24,
        uptime.num_minutes() % 60,
        uptime.num_seconds() % 60
    );
    if days > 0 {
        format!("{}d {}", days, clock)
    } else {
        clock
    }
}

/// Handler for GET /api/status
#[tracing::instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let start_time = SERVER_START_TIME.get_or_init(Instant::now);
    let uptime_seconds = start_time.elapsed().as_secs();
    let store = state.tracker.store();

    let status = StatusInfo {
        version: env!("VERGEN_GIT_DESCRIBE"),
        git_commit: env!("VERGEN_GIT_SHA"),
        build_timestamp: env!("VERGEN_BUILD_TIMESTAMP"),
        uptime_seconds,
        uptime_human: format_uptime(chrono::Duration::seconds(uptime_seconds as i64)),
        tracked_flights: store.len(),
        active_flights: state.tracker.list_active().len(),
        stale_after_seconds: store.stale_after().num_seconds(),
    };

    (StatusCode::OK, Json(DataResponse { data: status }))
}
