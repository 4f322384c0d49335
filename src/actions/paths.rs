use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::debug;

use crate::actions::{DataResponse, json_error};
use crate::geometry::{LatLon, PathRequest, Reconstruction, reconstruct};
use crate::live_flights::IdentityKey;
use crate::web::AppState;

/// Endpoint coordinates for drawing a stored flight's route
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPathRequest {
    pub departure: LatLon,
    pub arrival: LatLon,
    #[serde(default)]
    pub simulated_route: bool,
}

fn path_response(result: Result<Reconstruction, crate::error::ValidationError>) -> Response {
    match result {
        Ok(reconstruction) => {
            if let Some(path) = reconstruction.path() {
                debug!(
                    "Reconstructed {:?} path with {} points ({:.1} km)",
                    path.source,
                    path.primary.len(),
                    path.distance_km
                );
            }
            Json(DataResponse {
                data: reconstruction,
            })
            .into_response()
        }
        Err(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

/// Reconstruct a renderable path from dense samples or two endpoints
pub async fn reconstruct_path(Json(request): Json<PathRequest>) -> impl IntoResponse {
    path_response(reconstruct(&request))
}

/// Sparse path for a stored flight, centered on its current position and
/// labeled with its airports
pub async fn live_flight_path(
    Path((user_id, callsign)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(request): Json<FlightPathRequest>,
) -> impl IntoResponse {
    let key = match IdentityKey::new(&user_id, &callsign) {
        Ok(key) => key,
        Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };
    let Some(flight) = state.tracker.get(&key) else {
        return json_error(StatusCode::NOT_FOUND, format!("No live flight for {}", key));
    };

    let request = PathRequest::for_live_flight(
        &flight,
        request.departure,
        request.arrival,
        request.simulated_route,
    );
    path_response(reconstruct(&request))
}
