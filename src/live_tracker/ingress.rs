use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::live_flights::{Altitude, IdentityKey};

/// A raw position report as it arrives from a pilot client or an adapted feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    #[serde(default)]
    pub user_id: String,
    /// Optional link to a previously logged flight
    #[serde(default)]
    pub flight_id: Option<String>,
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub departure_airport: Option<String>,
    #[serde(default)]
    pub arrival_airport: Option<String>,
    #[serde(default)]
    pub current_latitude: Option<f64>,
    #[serde(default)]
    pub current_longitude: Option<f64>,
    #[serde(default)]
    pub current_altitude_ft: Option<f64>,
    #[serde(default)]
    pub current_speed_kts: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
    /// `false` marks the flight as ended
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    /// When the sample was taken; ingest time is used when absent
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
}

fn default_is_active() -> bool {
    true
}

impl Default for PositionReport {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            flight_id: None,
            callsign: String::new(),
            aircraft_type: None,
            departure_airport: None,
            arrival_airport: None,
            current_latitude: None,
            current_longitude: None,
            current_altitude_ft: None,
            current_speed_kts: None,
            heading_deg: None,
            is_active: true,
            reported_at: None,
        }
    }
}

/// A validated report with its identity key resolved
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReport {
    pub key: IdentityKey,
    pub logged_flight_id: Option<String>,
    pub aircraft_type: Option<String>,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub ended: bool,
    pub reported_at: Option<DateTime<Utc>>,
}

/// Validate and normalize a report. Pure; touches no store state.
///
/// The aircraft type is only mandatory when the report creates a flight, which
/// this function can't know; see [`require_aircraft_type`].
pub fn normalize(report: &PositionReport) -> Result<NormalizedReport, ValidationError> {
    let key = IdentityKey::new(&report.user_id, &report.callsign)?;

    let latitude = coordinate(report.current_latitude, "current_latitude", 90.0)?;
    let longitude = coordinate(report.current_longitude, "current_longitude", 180.0)?;

    let altitude = match report.current_altitude_ft {
        Some(ft) => Altitude::Feet(non_negative(ft, "current_altitude_ft")?),
        None => Altitude::Unknown,
    };
    let ground_speed_kts = report
        .current_speed_kts
        .map(|kts| non_negative(kts, "current_speed_kts"))
        .transpose()?;
    let heading_deg = report
        .heading_deg
        .map(|deg| finite(deg, "heading_deg").map(normalize_heading))
        .transpose()?;

    Ok(NormalizedReport {
        key,
        logged_flight_id: non_blank(report.flight_id.as_deref()),
        aircraft_type: non_blank(report.aircraft_type.as_deref()),
        departure_airport: airport_code(report.departure_airport.as_deref()),
        arrival_airport: airport_code(report.arrival_airport.as_deref()),
        latitude,
        longitude,
        altitude,
        ground_speed_kts,
        heading_deg,
        ended: !report.is_active,
        reported_at: report.reported_at,
    })
}

/// First report for a key must name the aircraft
pub fn require_aircraft_type(report: &NormalizedReport) -> Result<&str, ValidationError> {
    report
        .aircraft_type
        .as_deref()
        .ok_or_else(|| ValidationError::MissingAircraftType {
            key: report.key.to_string(),
        })
}

/// Reject a reported time too far ahead of `now`.
///
/// A far-future report would otherwise win every later comparison and never go stale.
pub fn check_reported_at(
    reported_at: DateTime<Utc>,
    now: DateTime<Utc>,
    max_skew: Duration,
) -> Result<(), ValidationError> {
    if reported_at > now + max_skew {
        return Err(ValidationError::ReportedInFuture {
            reported_at,
            now,
            max_skew_secs: max_skew.num_seconds(),
        });
    }
    Ok(())
}

/// Fold any finite heading into [0, 360)
pub fn normalize_heading(deg: f64) -> f64 {
    let folded = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if folded >= 360.0 { 0.0 } else { folded }
}

fn coordinate(value: Option<f64>, field: &'static str, limit: f64) -> Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField { field })?;
    let value = finite(value, field)?;
    if !(-limit..=limit).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: -limit,
            max: limit,
        });
    }
    Ok(value)
}

fn finite(value: f64, field: &'static str) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}

fn non_negative(value: f64, field: &'static str) -> Result<f64, ValidationError> {
    let value = finite(value, field)?;
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(value)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn airport_code(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|code| code.to_uppercase())
}
