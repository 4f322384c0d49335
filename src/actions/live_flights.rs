use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::actions::{DataResponse, json_error};
use crate::collaborators::label_flights;
use crate::error::IngestError;
use crate::live_flights::IdentityKey;
use crate::live_tracker::PositionReport;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct ExternalIngestRequest {
    pub user_id: String,
}

/// Ingest one position report
pub async fn ingest_live_flight(
    State(state): State<AppState>,
    Json(report): Json<PositionReport>,
) -> impl IntoResponse {
    match state.tracker.ingest(&report).await {
        Ok(receipt) => Json(DataResponse { data: receipt }).into_response(),
        Err(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

/// Active flights, labeled with operator profiles
pub async fn list_live_flights(State(state): State<AppState>) -> impl IntoResponse {
    let flights = state.tracker.list_active();

    match label_flights(flights, state.profiles.as_ref()).await {
        Ok(labeled) => Json(DataResponse { data: labeled }).into_response(),
        Err(e) => {
            error!("Failed to label live flights: {}", e);
            json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// One flight by identity key, active or not
pub async fn get_live_flight(
    Path((user_id, callsign)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let key = match IdentityKey::new(&user_id, &callsign) {
        Ok(key) => key,
        Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    match state.tracker.get(&key) {
        Some(flight) => Json(DataResponse { data: flight }).into_response(),
        None => json_error(StatusCode::NOT_FOUND, format!("No live flight for {}", key)),
    }
}

/// Pull a pilot from the external telemetry feed and ingest it for `user_id`
pub async fn ingest_external_pilot(
    Path(pilot_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ExternalIngestRequest>,
) -> impl IntoResponse {
    let Some(source) = state.telemetry.as_ref() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No external telemetry source is configured",
        );
    };

    match state
        .tracker
        .ingest_external(source.as_ref(), &pilot_id, &request.user_id)
        .await
    {
        Ok(Some(receipt)) => Json(DataResponse { data: receipt }).into_response(),
        Ok(None) => json_error(
            StatusCode::NOT_FOUND,
            format!("Pilot {} is not on the telemetry feed", pilot_id),
        ),
        Err(IngestError::Validation(e)) => {
            warn!("External report for pilot {} rejected: {}", pilot_id, e);
            json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(IngestError::Upstream(e)) => json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
