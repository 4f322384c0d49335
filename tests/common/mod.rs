//! Shared builders for live flight integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use flightdeck::clock::ManualClock;
use flightdeck::live_tracker::{
    LiveFlightTracker, PositionReport, RestartPolicy, TrackerSettings,
};
use std::sync::Arc;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

/// Tracker on a manual clock set to [`t0`], five minute staleness
pub fn tracker() -> (LiveFlightTracker, Arc<ManualClock>) {
    tracker_with_policy(RestartPolicy::NewSegment)
}

pub fn tracker_with_policy(policy: RestartPolicy) -> (LiveFlightTracker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let settings = TrackerSettings {
        stale_after: Duration::minutes(5),
        restart_policy: policy,
        ..TrackerSettings::default()
    };
    (LiveFlightTracker::with_clock(settings, clock.clone()), clock)
}

/// A complete report from `user_id`/`callsign` at `t0 + offset_secs`
pub fn report(user_id: &str, callsign: &str, lat: f64, lon: f64, offset_secs: i64) -> PositionReport {
    PositionReport {
        user_id: user_id.to_string(),
        callsign: callsign.to_string(),
        aircraft_type: Some("B738".to_string()),
        departure_airport: Some("EGLL".to_string()),
        arrival_airport: Some("LFPG".to_string()),
        current_latitude: Some(lat),
        current_longitude: Some(lon),
        current_altitude_ft: Some(35_000.0),
        current_speed_kts: Some(450.0),
        heading_deg: Some(135.0),
        reported_at: Some(t0() + Duration::seconds(offset_secs)),
        ..Default::default()
    }
}

/// Explicit end-of-flight report at `t0 + offset_secs`
pub fn termination(user_id: &str, callsign: &str, offset_secs: i64) -> PositionReport {
    PositionReport {
        is_active: false,
        ..report(user_id, callsign, 49.0, 2.55, offset_secs)
    }
}
