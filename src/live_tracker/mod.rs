mod identity;
pub mod ingress;
mod state_store;
pub(crate) mod utils;

pub use identity::{Resolution, ResolutionKind, RestartPolicy, resolve};
pub use ingress::{
    NormalizedReport, PositionReport, check_reported_at, normalize, normalize_heading,
};
pub use state_store::{LiveStateStore, UpsertOutcome, classify};

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::collaborators::TelemetrySource;
use crate::error::{IngestError, ValidationError};
use crate::live_flights::{IdentityKey, LiveFlight};

/// Operational parameters for the tracker
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// A flight with no report for longer than this is stale
    pub stale_after: Duration,
    pub restart_policy: RestartPolicy,
    /// How far ahead of the clock a report's time may be
    pub max_clock_skew: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(5),
            restart_policy: RestartPolicy::default(),
            max_clock_skew: Duration::minutes(5),
        }
    }
}

/// What an ingest did, with the record as stored afterwards
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub outcome: UpsertOutcome,
    pub flight: LiveFlight,
}

/// Write and read entry point for live flights.
///
/// Ingest runs ingress validation, identity resolution and the store upsert;
/// a background checker periodically deactivates stale flights.
#[derive(Clone)]
pub struct LiveFlightTracker {
    store: Arc<LiveStateStore>,
    clock: Arc<dyn Clock>,
    restart_policy: RestartPolicy,
    max_clock_skew: Duration,
}

impl LiveFlightTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: TrackerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(LiveStateStore::new(clock.clone(), settings.stale_after)),
            clock,
            restart_policy: settings.restart_policy,
            max_clock_skew: settings.max_clock_skew,
        }
    }

    pub fn store(&self) -> &LiveStateStore {
        &self.store
    }

    /// Validate a report and apply it to the store
    #[tracing::instrument(skip(self, report), fields(user_id = %report.user_id, callsign = %report.callsign))]
    pub async fn ingest(&self, report: &PositionReport) -> Result<IngestReceipt, ValidationError> {
        let normalized = normalize(report).inspect_err(|e| {
            metrics::counter!("live_flights.validation_rejected_total").increment(1);
            warn!("Rejected position report: {}", e);
        })?;

        let received_at = self.clock.now();
        let reported_at = normalized.reported_at.unwrap_or(received_at);
        check_reported_at(reported_at, received_at, self.max_clock_skew).inspect_err(|e| {
            metrics::counter!("live_flights.validation_rejected_total").increment(1);
            warn!("Rejected position report: {}", e);
        })?;
        let policy = self.restart_policy;
        let key = normalized.key.clone();

        let upsert_start = std::time::Instant::now();
        let result = self
            .store
            .upsert_with(&key, |existing| -> Result<LiveFlight, ValidationError> {
                let resolution = resolve(existing, &normalized, reported_at, received_at, policy)?;
                trace!("Resolved {} as {:?}", key, resolution.kind);
                Ok(resolution.record)
            })
            .await;
        metrics::histogram!("live_flights.upsert_ms")
            .record(upsert_start.elapsed().as_micros() as f64 / 1000.0);

        let (outcome, flight) = result.inspect_err(|e: &ValidationError| {
            metrics::counter!("live_flights.validation_rejected_total").increment(1);
            warn!("Rejected position report for {}: {}", key, e);
        })?;

        metrics::counter!("live_flights.upserts_total", "outcome" => outcome.as_str())
            .increment(1);

        match outcome {
            UpsertOutcome::Superseded => {
                // Expected under out-of-order delivery
                debug!(
                    "Superseded report for {} at {} (stored {})",
                    key, reported_at, flight.last_updated_at
                );
            }
            UpsertOutcome::Inserted => info!(
                "Tracking new flight {} ({}) at {:.4}, {:.4}",
                key, flight.aircraft_type, flight.latitude, flight.longitude
            ),
            UpsertOutcome::Terminated => info!("Flight {} ended", key),
            UpsertOutcome::Restarted => info!(
                "Flight {} resumed after termination (segment {})",
                key, flight.segment
            ),
            UpsertOutcome::Updated | UpsertOutcome::Unchanged => trace!(
                "{} flight {} at {:.4}, {:.4}",
                outcome.as_str(),
                key,
                flight.latitude,
                flight.longitude
            ),
        }

        Ok(IngestReceipt { outcome, flight })
    }

    /// Fetch a pilot from an external feed and ingest it as `user_id`'s report.
    ///
    /// Returns `Ok(None)` when the feed doesn't know the pilot.
    pub async fn ingest_external(
        &self,
        source: &dyn TelemetrySource,
        pilot_id: &str,
        user_id: &str,
    ) -> Result<Option<IngestReceipt>, IngestError> {
        let Some(pilot) = source.pilot(pilot_id).await.inspect_err(|e| {
            metrics::counter!("live_flights.upstream_errors_total").increment(1);
            warn!("Telemetry feed lookup for pilot {} failed: {}", pilot_id, e);
        })?
        else {
            debug!("Pilot {} is not connected to the telemetry feed", pilot_id);
            return Ok(None);
        };

        let report = pilot.into_report(user_id);
        Ok(Some(self.ingest(&report).await?))
    }

    pub fn list_active(&self) -> Vec<LiveFlight> {
        self.store.list_active()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<LiveFlight> {
        self.store.get(key)
    }

    /// One maintenance pass: deactivate stale flights and refresh gauges
    pub fn run_maintenance(&self) -> usize {
        let deactivated = self.store.deactivate_stale();
        if deactivated > 0 {
            info!("Deactivated {} stale flights", deactivated);
            metrics::counter!("live_flights.maintenance_deactivated_total")
                .increment(deactivated as u64);
        }
        utils::update_live_flight_metrics(&self.store);
        deactivated
    }

    /// Start a background task that runs maintenance every `interval`
    pub fn start_maintenance_checker(
        &self,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                // Skip the first tick (immediate execution)
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    tracker.run_maintenance();
                }
            }
            .instrument(tracing::info_span!("live_flight_maintenance")),
        );
        info!(
            "Started live flight maintenance (every {} seconds)",
            interval.as_secs()
        );
        handle
    }
}
