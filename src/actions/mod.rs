pub mod live_flights;
pub mod paths;
pub mod status;

pub use live_flights::*;
pub use paths::*;
pub use status::*;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope for successful JSON responses
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// JSON error body `{"error": message}` with the given status
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
