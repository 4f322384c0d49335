mod common;

use chrono::Duration;
use common::{report, t0, termination, tracker, tracker_with_policy};
use flightdeck::error::ValidationError;
use flightdeck::live_flights::{Altitude, IdentityKey, LiveFlight};
use flightdeck::live_tracker::{LiveFlightTracker, PositionReport, RestartPolicy, UpsertOutcome};
use tokio::task::JoinSet;

fn key(user_id: &str, callsign: &str) -> IdentityKey {
    IdentityKey::new(user_id, callsign).unwrap()
}

async fn apply_all(tracker: &LiveFlightTracker, reports: &[&PositionReport]) -> LiveFlight {
    for r in reports {
        tracker.ingest(r).await.unwrap();
    }
    tracker.get(&key("u1", "BAW1")).unwrap()
}

#[tokio::test]
async fn test_newer_report_wins_in_either_arrival_order() {
    let mut r1 = report("u1", "BAW1", 51.40, -0.40, 0);
    r1.flight_id = Some("log-1".to_string());
    let mut r2 = report("u1", "BAW1", 51.30, -0.10, 30);
    r2.departure_airport = None;
    r2.current_altitude_ft = None;

    let (in_order, _) = tracker();
    in_order.ingest(&r1).await.unwrap();
    let second = in_order.ingest(&r2).await.unwrap();
    assert_eq!(second.outcome, UpsertOutcome::Updated);

    let (reversed, _) = tracker();
    reversed.ingest(&r2).await.unwrap();
    let late = reversed.ingest(&r1).await.unwrap();
    assert_eq!(late.outcome, UpsertOutcome::Superseded);

    let a = in_order.get(&key("u1", "BAW1")).unwrap();
    let b = reversed.get(&key("u1", "BAW1")).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.position(), (51.30, -0.10));
    assert_eq!(a.last_updated_at, t0() + Duration::seconds(30));
    assert_eq!(a.departure_airport, None);
    assert_eq!(a.logged_flight_id, None);
    assert_eq!(a.altitude, Altitude::Unknown);
}

#[tokio::test]
async fn test_termination_and_later_update_in_either_order() {
    let start = report("u1", "BAW1", 51.0, 0.0, 0);
    let ended = termination("u1", "BAW1", 100);
    let resumed = report("u1", "BAW1", 49.0, 2.5, 200);

    for policy in [RestartPolicy::NewSegment, RestartPolicy::Reactivate] {
        let (first, _) = tracker_with_policy(policy);
        let a = apply_all(&first, &[&start, &ended, &resumed]).await;
        let (second, _) = tracker_with_policy(policy);
        let b = apply_all(&second, &[&start, &resumed, &ended]).await;

        assert!(a.is_active && b.is_active);
        assert_eq!(a.position(), (49.0, 2.5));
        match policy {
            RestartPolicy::Reactivate => assert_eq!(a, b),
            // Only the segment counter records that the termination was seen first
            RestartPolicy::NewSegment => {
                assert_eq!((a.segment, b.segment), (2, 1));
                assert_eq!(LiveFlight { segment: 1, ..a }, b);
            }
        }
    }
}

#[tokio::test]
async fn test_far_future_report_is_rejected() {
    let (tracker, clock) = tracker();
    let far_future = report("u1", "BAW1", 51.0, 0.0, 365 * 24 * 3600);

    let err = tracker.ingest(&far_future).await.unwrap_err();
    assert!(matches!(err, ValidationError::ReportedInFuture { .. }));
    assert!(tracker.store().is_empty());

    tracker.ingest(&report("u1", "BAW1", 51.0, 0.0, 10)).await.unwrap();
    let receipt = tracker
        .ingest(&report("u1", "BAW1", 51.1, 0.1, 20))
        .await
        .unwrap();
    assert_eq!(receipt.outcome, UpsertOutcome::Updated);

    clock.advance(Duration::days(30));
    assert!(tracker.list_active().is_empty());
}

#[tokio::test]
async fn test_same_report_twice_is_idempotent() {
    let (tracker, _) = tracker();
    let r = report("u1", "baw1", 51.4, -0.4, 0);

    let first = tracker.ingest(&r).await.unwrap();
    let second = tracker.ingest(&r).await.unwrap();

    assert_eq!(first.outcome, UpsertOutcome::Inserted);
    assert_eq!(second.outcome, UpsertOutcome::Unchanged);
    assert_eq!(first.flight, second.flight);
    assert_eq!(tracker.store().len(), 1);
}

#[tokio::test]
async fn test_older_report_leaves_listing_untouched() {
    let (tracker, clock) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.3, -0.1, 60)).await.unwrap();
    tracker.ingest(&report("u2", "AFR7", 48.9, 2.4, 60)).await.unwrap();
    clock.advance(Duration::seconds(60));

    let before = tracker.list_active();
    let receipt = tracker
        .ingest(&report("u1", "BAW1", 10.0, 10.0, 0))
        .await
        .unwrap();

    assert_eq!(receipt.outcome, UpsertOutcome::Superseded);
    assert_eq!(receipt.flight.position(), (51.3, -0.1));
    assert_eq!(tracker.list_active(), before);
}

#[tokio::test]
async fn test_callsign_case_and_whitespace_share_one_record() {
    let (tracker, _) = tracker();
    tracker.ingest(&report("u1", "baw1", 51.4, -0.4, 0)).await.unwrap();
    let receipt = tracker
        .ingest(&report(" u1 ", " BAW1 ", 51.3, -0.3, 10))
        .await
        .unwrap();

    assert_eq!(receipt.outcome, UpsertOutcome::Updated);
    assert_eq!(tracker.store().len(), 1);
    assert_eq!(receipt.flight.callsign, "BAW1");
}

#[tokio::test]
async fn test_same_callsign_different_operators_are_separate() {
    let (tracker, _) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.4, -0.4, 0)).await.unwrap();
    tracker.ingest(&report("u2", "BAW1", 40.6, -73.8, 0)).await.unwrap();

    let active = tracker.list_active();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].operator_id, "u1");
    assert_eq!(active[1].operator_id, "u2");
}

#[tokio::test]
async fn test_validation_error_leaves_store_untouched() {
    let (tracker, _) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.4, -0.4, 0)).await.unwrap();

    let mut bad = report("u1", "BAW1", 95.0, -0.4, 30);
    assert!(tracker.ingest(&bad).await.is_err());

    bad.current_latitude = Some(51.0);
    bad.current_altitude_ft = Some(-10.0);
    assert!(tracker.ingest(&bad).await.is_err());

    let stored = tracker.get(&key("u1", "BAW1")).unwrap();
    assert_eq!(stored.last_updated_at, t0());
}

#[tokio::test]
async fn test_first_report_without_aircraft_type_is_rejected() {
    let (tracker, _) = tracker();
    let mut r = report("u1", "BAW1", 51.4, -0.4, 0);
    r.aircraft_type = None;

    assert!(tracker.ingest(&r).await.is_err());
    assert!(tracker.store().is_empty());

    // Once the flight exists the type is carried forward; nothing else is
    r.aircraft_type = Some("A320".to_string());
    tracker.ingest(&r).await.unwrap();
    let mut next = report("u1", "BAW1", 51.3, -0.3, 30);
    next.aircraft_type = None;
    next.departure_airport = None;
    let receipt = tracker.ingest(&next).await.unwrap();
    assert_eq!(receipt.flight.aircraft_type, "A320");
    assert_eq!(receipt.flight.departure_airport, None);
}

#[tokio::test]
async fn test_missing_altitude_stays_unknown() {
    let (tracker, _) = tracker();
    let mut r = report("u1", "BAW1", 51.4, -0.4, 0);
    r.current_altitude_ft = None;

    let receipt = tracker.ingest(&r).await.unwrap();
    assert_eq!(receipt.flight.altitude, Altitude::Unknown);
}

#[tokio::test]
async fn test_maintenance_deactivates_only_stale_flights() {
    let (tracker, clock) = tracker();
    tracker.ingest(&report("u1", "OLD1", 51.0, 0.0, 0)).await.unwrap();
    tracker.ingest(&report("u2", "NEW1", 52.0, 0.0, 240)).await.unwrap();

    // OLD1 is 301 seconds old, NEW1 61 seconds
    clock.set(t0() + Duration::seconds(301));
    assert_eq!(tracker.run_maintenance(), 1);

    let active = tracker.list_active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].callsign, "NEW1");

    // Deactivated, not deleted
    let old = tracker.get(&key("u1", "OLD1")).unwrap();
    assert!(!old.is_active);
    assert_eq!(tracker.store().len(), 2);

    // Nothing listed is older than the threshold
    let now = t0() + Duration::seconds(301);
    assert!(
        tracker
            .list_active()
            .iter()
            .all(|f| now.signed_duration_since(f.last_updated_at) <= Duration::minutes(5))
    );

    // A second pass has nothing left to do
    assert_eq!(tracker.run_maintenance(), 0);
}

#[tokio::test]
async fn test_listing_hides_stale_flights_before_maintenance_runs() {
    let (tracker, clock) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.0, 0.0, 0)).await.unwrap();

    clock.set(t0() + Duration::minutes(5));
    assert_eq!(tracker.list_active().len(), 1);

    clock.advance(Duration::seconds(1));
    assert!(tracker.list_active().is_empty());
}

#[tokio::test]
async fn test_fresh_report_reactivates_stale_flight() {
    let (tracker, clock) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.0, 0.0, 0)).await.unwrap();
    clock.set(t0() + Duration::minutes(10));
    tracker.run_maintenance();

    let receipt = tracker
        .ingest(&report("u1", "BAW1", 51.5, 0.5, 600))
        .await
        .unwrap();

    assert_eq!(receipt.outcome, UpsertOutcome::Updated);
    assert!(receipt.flight.is_active);
    assert_eq!(receipt.flight.segment, 1);
    assert_eq!(tracker.list_active().len(), 1);
}

#[tokio::test]
async fn test_termination_beats_earlier_and_simultaneous_reports() {
    let (tracker, _) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.0, 0.0, 0)).await.unwrap();

    let ended = tracker.ingest(&termination("u1", "BAW1", 100)).await.unwrap();
    assert_eq!(ended.outcome, UpsertOutcome::Terminated);
    assert!(!ended.flight.is_active);
    assert!(ended.flight.ended);

    let late = tracker
        .ingest(&report("u1", "BAW1", 50.0, 1.0, 90))
        .await
        .unwrap();
    assert_eq!(late.outcome, UpsertOutcome::Superseded);

    let tie = tracker
        .ingest(&report("u1", "BAW1", 50.0, 1.0, 100))
        .await
        .unwrap();
    assert_eq!(tie.outcome, UpsertOutcome::Superseded);

    assert!(tracker.list_active().is_empty());
}

#[tokio::test]
async fn test_report_after_termination_starts_new_segment() {
    let (tracker, _) = tracker();
    let mut first = report("u1", "BAW1", 51.0, 0.0, 0);
    first.flight_id = Some("log-1".to_string());
    tracker.ingest(&first).await.unwrap();
    tracker.ingest(&termination("u1", "BAW1", 100)).await.unwrap();

    let resumed = tracker
        .ingest(&report("u1", "BAW1", 49.0, 2.5, 200))
        .await
        .unwrap();

    assert_eq!(resumed.outcome, UpsertOutcome::Restarted);
    assert_eq!(resumed.flight.segment, 2);
    assert_eq!(resumed.flight.last_updated_at, t0() + Duration::seconds(200));
    assert!(resumed.flight.is_active);
    assert!(!resumed.flight.ended);
    assert_eq!(resumed.flight.logged_flight_id, None);
    assert_eq!(tracker.store().len(), 1);
}

#[tokio::test]
async fn test_reactivate_policy_keeps_segment() {
    let (tracker, _) = tracker_with_policy(RestartPolicy::Reactivate);
    let mut first = report("u1", "BAW1", 51.0, 0.0, 0);
    first.flight_id = Some("log-1".to_string());
    tracker.ingest(&first).await.unwrap();
    tracker.ingest(&termination("u1", "BAW1", 100)).await.unwrap();

    let resumed = tracker
        .ingest(&report("u1", "BAW1", 49.0, 2.5, 200))
        .await
        .unwrap();

    assert_eq!(resumed.outcome, UpsertOutcome::Restarted);
    assert_eq!(resumed.flight.segment, 1);
    assert!(resumed.flight.is_active);
    assert!(!resumed.flight.ended);
}

#[tokio::test]
async fn test_concurrent_upserts_to_distinct_keys() {
    let (tracker, _) = tracker();
    let flights = 32;
    let reports_per_flight = 20;

    let mut tasks = JoinSet::new();
    for n in 0..flights {
        let tracker = tracker.clone();
        tasks.spawn(async move {
            let callsign = format!("TST{n}");
            for i in 0..reports_per_flight {
                let lat = n as f64;
                let lon = i as f64;
                tracker
                    .ingest(&report("crew", &callsign, lat, lon, i))
                    .await
                    .unwrap();
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let active = tracker.list_active();
    assert_eq!(active.len(), flights);
    for flight in active {
        let n: f64 = flight.callsign.trim_start_matches("TST").parse().unwrap();
        assert_eq!(flight.latitude, n);
        assert_eq!(flight.longitude, (reports_per_flight - 1) as f64);
    }
}

#[tokio::test]
async fn test_concurrent_reports_to_one_key_keep_newest() {
    let (tracker, _) = tracker();

    let mut tasks = JoinSet::new();
    for i in (0..50).rev() {
        let tracker = tracker.clone();
        tasks.spawn(async move {
            tracker
                .ingest(&report("u1", "BAW1", 51.0, i as f64 / 100.0, i))
                .await
                .unwrap()
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let stored = tracker.get(&key("u1", "BAW1")).unwrap();
    assert_eq!(stored.last_updated_at, t0() + Duration::seconds(49));
    assert_eq!(stored.longitude, 0.49);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_checker_runs_on_interval() {
    let (tracker, clock) = tracker();
    tracker.ingest(&report("u1", "BAW1", 51.0, 0.0, 0)).await.unwrap();
    clock.set(t0() + Duration::minutes(6));

    let handle = tracker.start_maintenance_checker(std::time::Duration::from_secs(30));
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;

    assert!(!tracker.get(&key("u1", "BAW1")).unwrap().is_active);
    handle.abort();
}
