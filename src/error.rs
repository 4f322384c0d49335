//! Error types for live flight ingestion and path reconstruction.
//!
//! A superseded (out-of-order) write is not an error; see
//! [`crate::live_tracker::UpsertOutcome::Superseded`]. A missing record is
//! reported as `None`, not as an error.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Malformed or out-of-range input, rejected before any store mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("operator id must not be empty")]
    EmptyOperatorId,

    #[error("callsign must not be empty")]
    EmptyCallsign,

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("aircraft type is required on the first report for {key}")]
    MissingAircraftType { key: String },

    #[error("reported time {reported_at} is more than {max_skew_secs}s ahead of {now}")]
    ReportedInFuture {
        reported_at: DateTime<Utc>,
        now: DateTime<Utc>,
        max_skew_secs: i64,
    },
}

/// An external collaborator (profile directory, telemetry feed) failed.
///
/// Always retryable from the caller's point of view; nothing in this crate
/// retries on its own.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("{service} timed out after {timeout_secs}s")]
    Timeout {
        service: &'static str,
        timeout_secs: u64,
    },

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned an unreadable payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

/// Failure of an ingest that may have involved an upstream fetch
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
