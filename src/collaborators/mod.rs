//! Interfaces to systems this crate does not own.
//!
//! - [`ProfileDirectory`]: display names and emails, used only to label flights
//! - [`TelemetrySource`]: third-party live pilot feed, adapted into position reports
//!
//! Failures surface as [`UpstreamError`] and are never retried here.

mod telemetry_client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::UpstreamError;
use crate::live_flights::LiveFlight;
use crate::live_tracker::PositionReport;

pub use telemetry_client::HttpTelemetrySource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    pub email: Option<String>,
}

/// Looks up user profiles by id
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Resolve a batch of user ids. Unknown ids are simply missing from the map.
    async fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>, UpstreamError>;
}

/// Profile directory backed by a fixed map
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileDirectory {
    profiles: HashMap<String, Profile>,
}

impl InMemoryProfileDirectory {
    pub fn new(profiles: HashMap<String, Profile>) -> Self {
        Self { profiles }
    }

    pub fn insert(&mut self, user_id: impl Into<String>, profile: Profile) {
        self.profiles.insert(user_id.into(), profile);
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryProfileDirectory {
    async fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>, UpstreamError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

/// A live flight with the operator's profile attached, for map labels
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledFlight {
    #[serde(flatten)]
    pub flight: LiveFlight,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Attach display names to flights with one directory lookup
pub async fn label_flights(
    flights: Vec<LiveFlight>,
    directory: &dyn ProfileDirectory,
) -> Result<Vec<LabeledFlight>, UpstreamError> {
    let mut user_ids: Vec<String> = flights.iter().map(|f| f.operator_id.clone()).collect();
    user_ids.sort();
    user_ids.dedup();

    let profiles = if user_ids.is_empty() {
        HashMap::new()
    } else {
        directory.profiles(&user_ids).await?
    };
    debug!(
        "Resolved {} of {} operator profiles",
        profiles.len(),
        user_ids.len()
    );

    Ok(flights
        .into_iter()
        .map(|flight| {
            let profile = profiles.get(&flight.operator_id);
            LabeledFlight {
                display_name: profile.map(|p| p.display_name.clone()),
                email: profile.and_then(|p| p.email.clone()),
                flight,
            }
        })
        .collect())
}

/// Flight plan as filed on the external network
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalFlightPlan {
    #[serde(default, alias = "aircraft_short")]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub arrival: Option<String>,
}

/// One pilot as seen by the external telemetry network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPilot {
    #[serde(alias = "cid")]
    pub pilot_id: String,
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "altitude")]
    pub altitude_ft: Option<f64>,
    #[serde(default, alias = "groundspeed")]
    pub groundspeed_kts: Option<f64>,
    #[serde(default, alias = "heading")]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub flight_plan: Option<ExternalFlightPlan>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ExternalPilot {
    /// Adapt into an ordinary position report owned by `user_id`
    pub fn into_report(self, user_id: &str) -> PositionReport {
        let plan = self.flight_plan.unwrap_or_default();
        PositionReport {
            user_id: user_id.to_string(),
            flight_id: None,
            callsign: self.callsign,
            aircraft_type: plan.aircraft_type,
            departure_airport: plan.departure,
            arrival_airport: plan.arrival,
            current_latitude: Some(self.latitude),
            current_longitude: Some(self.longitude),
            current_altitude_ft: self.altitude_ft,
            current_speed_kts: self.groundspeed_kts,
            heading_deg: self.heading_deg,
            is_active: true,
            reported_at: self.last_updated,
        }
    }
}

/// Third-party live pilot feed
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Current data for a pilot, or `None` if the pilot is not connected
    async fn pilot(&self, pilot_id: &str) -> Result<Option<ExternalPilot>, UpstreamError>;
}
