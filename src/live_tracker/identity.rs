use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ingress::{NormalizedReport, require_aircraft_type};
use crate::error::ValidationError;
use crate::live_flights::LiveFlight;

/// What happens when a position report arrives after a flight was explicitly ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Start a new segment by bumping `segment`
    #[default]
    NewSegment,
    /// Reactivate the ended segment as if it had never ended
    Reactivate,
}

/// How an incoming report relates to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    Create,
    Continue,
    Restart,
}

/// Candidate record for the store, plus how it was derived
#[derive(Debug, Clone)]
pub struct Resolution {
    pub kind: ResolutionKind,
    pub record: LiveFlight,
}

/// Decide create vs update for a report and build the full candidate record.
///
/// The report replaces the stored content in full, so the record a key ends up
/// with depends only on the newest report, not on arrival order. The aircraft
/// type is the one exception: it is required when creating and falls back to
/// the stored type afterwards. Nothing is persisted here; the store applies the
/// ordering rule.
pub fn resolve(
    existing: Option<&LiveFlight>,
    report: &NormalizedReport,
    reported_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
    policy: RestartPolicy,
) -> Result<Resolution, ValidationError> {
    let (kind, aircraft_type, segment) = match existing {
        None => (
            ResolutionKind::Create,
            require_aircraft_type(report)?.to_string(),
            1,
        ),
        Some(existing) => {
            let restarting = existing.ended && !report.ended;
            let segment = match (restarting, policy) {
                (true, RestartPolicy::NewSegment) => existing.segment + 1,
                _ => existing.segment,
            };
            let kind = if restarting {
                ResolutionKind::Restart
            } else {
                ResolutionKind::Continue
            };
            let aircraft_type = report
                .aircraft_type
                .clone()
                .unwrap_or_else(|| existing.aircraft_type.clone());
            (kind, aircraft_type, segment)
        }
    };

    Ok(Resolution {
        kind,
        record: LiveFlight {
            operator_id: report.key.operator_id().to_string(),
            callsign: report.key.callsign().to_string(),
            logged_flight_id: report.logged_flight_id.clone(),
            aircraft_type,
            departure_airport: report.departure_airport.clone(),
            arrival_airport: report.arrival_airport.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            altitude: report.altitude,
            ground_speed_kts: report.ground_speed_kts,
            heading_deg: report.heading_deg,
            last_updated_at: reported_at,
            received_at,
            segment,
            is_active: !report.ended,
            ended: report.ended,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_tracker::ingress::{PositionReport, normalize};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn normalized(aircraft_type: Option<&str>, is_active: bool) -> NormalizedReport {
        normalize(&PositionReport {
            user_id: "op-1".to_string(),
            callsign: "ezy12".to_string(),
            flight_id: Some("log-55".to_string()),
            aircraft_type: aircraft_type.map(str::to_string),
            departure_airport: Some("EGKK".to_string()),
            current_latitude: Some(51.15),
            current_longitude: Some(-0.18),
            is_active,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_requires_aircraft_type() {
        let result = resolve(
            None,
            &normalized(None, true),
            t0(),
            t0(),
            RestartPolicy::NewSegment,
        );
        assert!(matches!(
            result,
            Err(ValidationError::MissingAircraftType { .. })
        ));
    }

    #[test]
    fn test_create_synthesizes_active_record() {
        let resolution = resolve(
            None,
            &normalized(Some("A319"), true),
            t0(),
            t0(),
            RestartPolicy::NewSegment,
        )
        .unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Create);
        assert!(resolution.record.is_active);
        assert_eq!(resolution.record.segment, 1);
        assert_eq!(resolution.record.callsign, "EZY12");
        assert_eq!(resolution.record.logged_flight_id.as_deref(), Some("log-55"));
    }

    #[test]
    fn test_update_replaces_descriptive_fields_except_aircraft_type() {
        let created = resolve(
            None,
            &normalized(Some("A319"), true),
            t0(),
            t0(),
            RestartPolicy::NewSegment,
        )
        .unwrap()
        .record;

        let mut update = normalized(None, true);
        update.departure_airport = None;
        update.logged_flight_id = None;
        update.latitude = 51.3;

        let later = t0() + Duration::seconds(30);
        let resolution =
            resolve(Some(&created), &update, later, later, RestartPolicy::NewSegment).unwrap();

        assert_eq!(resolution.kind, ResolutionKind::Continue);
        assert_eq!(resolution.record.aircraft_type, "A319");
        assert_eq!(resolution.record.departure_airport, None);
        assert_eq!(resolution.record.logged_flight_id, None);
        assert_eq!(resolution.record.latitude, 51.3);
        assert_eq!(resolution.record.last_updated_at, later);
    }

    #[test]
    fn test_restart_after_termination_policies() {
        let ended = resolve(
            None,
            &normalized(Some("A319"), false),
            t0(),
            t0(),
            RestartPolicy::NewSegment,
        )
        .unwrap()
        .record;
        assert!(ended.ended);
        assert!(!ended.is_active);

        let resumed = normalized(None, true);
        let later = t0() + Duration::minutes(40);

        let new_segment =
            resolve(Some(&ended), &resumed, later, later, RestartPolicy::NewSegment).unwrap();
        assert_eq!(new_segment.kind, ResolutionKind::Restart);
        assert_eq!(new_segment.record.segment, 2);
        assert!(new_segment.record.is_active);
        assert!(!new_segment.record.ended);

        let reactivated =
            resolve(Some(&ended), &resumed, later, later, RestartPolicy::Reactivate).unwrap();
        assert_eq!(reactivated.kind, ResolutionKind::Restart);
        assert_eq!(reactivated.record.segment, 1);
        assert!(reactivated.record.is_active);
    }
}
