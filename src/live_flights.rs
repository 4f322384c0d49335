use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Unique handle for a live flight: who is flying and under which callsign.
///
/// The callsign is trimmed and uppercased and the operator id is trimmed, so
/// `" baw123 "` and `"BAW123"` from the same operator are the same flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    operator_id: String,
    callsign: String,
}

impl IdentityKey {
    pub fn new(operator_id: &str, callsign: &str) -> Result<Self, ValidationError> {
        let operator_id = operator_id.trim();
        if operator_id.is_empty() {
            return Err(ValidationError::EmptyOperatorId);
        }
        let callsign = normalize_callsign(callsign);
        if callsign.is_empty() {
            return Err(ValidationError::EmptyCallsign);
        }
        Ok(Self {
            operator_id: operator_id.to_string(),
            callsign,
        })
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.operator_id, self.callsign)
    }
}

pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

/// Altitude in feet, or unknown when the reporter didn't send one.
///
/// Serialized as a nullable number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Altitude {
    Feet(f64),
    #[default]
    Unknown,
}

impl Altitude {
    pub fn feet(&self) -> Option<f64> {
        match self {
            Altitude::Feet(ft) => Some(*ft),
            Altitude::Unknown => None,
        }
    }
}

impl From<Option<f64>> for Altitude {
    fn from(value: Option<f64>) -> Self {
        value.map(Altitude::Feet).unwrap_or(Altitude::Unknown)
    }
}

impl From<Altitude> for Option<f64> {
    fn from(value: Altitude) -> Self {
        value.feet()
    }
}

/// Current state of one tracked flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveFlight {
    pub operator_id: String,
    pub callsign: String,

    /// Weak link to a logged flight, attached when the reporter knows it
    pub logged_flight_id: Option<String>,

    pub aircraft_type: String,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,

    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,

    /// Reported time of the newest accepted report
    pub last_updated_at: DateTime<Utc>,

    /// Clock time when the newest accepted report was applied
    pub received_at: DateTime<Utc>,

    /// Logical flight number under this identity key, bumped on restart after
    /// termination. Depends on whether the termination was seen before the
    /// restart; every other field depends only on reported times.
    pub segment: u32,

    pub is_active: bool,

    /// Set once an explicit termination report has been applied to this segment
    pub ended: bool,
}

impl LiveFlight {
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            operator_id: self.operator_id.clone(),
            callsign: self.callsign.clone(),
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// No report has refreshed this record within `stale_after` of `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        now.signed_duration_since(self.last_updated_at) > stale_after
    }

    /// Active flag set and not stale; what readers should treat as "live"
    pub fn is_live_at(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.is_active && !self.is_stale_at(now, stale_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_key_normalizes_callsign() {
        let a = IdentityKey::new("pilot-1", "  baw123 ").unwrap();
        let b = IdentityKey::new("pilot-1", "BAW123").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.callsign(), "BAW123");
        assert_eq!(a.to_string(), "pilot-1/BAW123");
    }

    #[test]
    fn test_identity_key_rejects_blank_parts() {
        assert_eq!(
            IdentityKey::new("  ", "BAW123"),
            Err(ValidationError::EmptyOperatorId)
        );
        assert_eq!(
            IdentityKey::new("pilot-1", " \t"),
            Err(ValidationError::EmptyCallsign)
        );
    }

    #[test]
    fn test_altitude_serializes_as_nullable_number() {
        assert_eq!(serde_json::to_string(&Altitude::Feet(3500.0)).unwrap(), "3500.0");
        assert_eq!(serde_json::to_string(&Altitude::Unknown).unwrap(), "null");
        let parsed: Altitude = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, Altitude::Unknown);
    }

    #[test]
    fn test_staleness_boundary() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let flight = LiveFlight {
            operator_id: "pilot-1".to_string(),
            callsign: "BAW123".to_string(),
            logged_flight_id: None,
            aircraft_type: "A320".to_string(),
            departure_airport: None,
            arrival_airport: None,
            latitude: 51.47,
            longitude: -0.45,
            altitude: Altitude::Unknown,
            ground_speed_kts: None,
            heading_deg: None,
            last_updated_at: t0,
            received_at: t0,
            segment: 1,
            is_active: true,
            ended: false,
        };
        let stale_after = Duration::minutes(5);

        assert!(!flight.is_stale_at(t0 + Duration::minutes(5), stale_after));
        assert!(flight.is_stale_at(t0 + Duration::minutes(5) + Duration::seconds(1), stale_after));
        assert!(flight.is_live_at(t0, stale_after));
    }
}
