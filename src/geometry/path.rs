//! Flight path reconstruction for the live map.
//!
//! Two inputs are supported:
//! - dense: an ordered list of real telemetry samples, rendered verbatim
//! - sparse: departure and arrival coordinates only, rendered as a straight
//!   segment with an optional decorative "simulated airway" through the map center
//!
//! The simulated airway is cosmetic. It is computed here on every render and
//! never written back into a live flight record.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, LatLon};
use crate::error::ValidationError;
use crate::live_flights::LiveFlight;

/// Degrees each endpoint of the simulated airway is pulled toward the center
const SIMULATED_ROUTE_SHIFT_DEG: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedPoint {
    #[serde(default)]
    pub name: Option<String>,
    pub position: LatLon,
}

impl NamedPoint {
    pub fn new(name: Option<&str>, position: LatLon) -> Self {
        Self {
            name: name.map(str::to_string),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathRequest {
    /// Real telemetry samples, oldest first, already in (lat, lon) order
    Dense { samples: Vec<LatLon> },
    /// Endpoints only
    Sparse {
        departure: NamedPoint,
        arrival: NamedPoint,
        center: LatLon,
        #[serde(default, rename = "simulatedRoute")]
        simulated_route: bool,
    },
}

impl PathRequest {
    /// Dense request from GeoJSON-ordered `[lon, lat]` samples
    pub fn dense_from_lon_lat(samples: &[[f64; 2]]) -> Self {
        PathRequest::Dense {
            samples: samples.iter().copied().map(LatLon::from_lon_lat).collect(),
        }
    }

    /// Sparse request centered on a live flight's current position, named after
    /// its airports
    pub fn for_live_flight(
        flight: &LiveFlight,
        departure: LatLon,
        arrival: LatLon,
        simulated_route: bool,
    ) -> Self {
        PathRequest::Sparse {
            departure: NamedPoint::new(flight.departure_airport.as_deref(), departure),
            arrival: NamedPoint::new(flight.arrival_airport.as_deref(), arrival),
            center: LatLon::new(flight.latitude, flight.longitude),
            simulated_route,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Departure,
    Arrival,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMarker {
    pub kind: MarkerKind,
    pub name: Option<String>,
    pub position: LatLon,
}

/// Where the primary line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSource {
    Telemetry,
    Endpoints,
}

/// Decorative dashed route for sparse paths. Not telemetry, not navigational.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedRoute {
    pub points: Vec<LatLon>,
    pub dashed: bool,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPath {
    pub source: PathSource,
    pub primary: Vec<LatLon>,
    pub departure: PathMarker,
    pub arrival: PathMarker,
    pub simulated_route: Option<SimulatedRoute>,
    /// Contains every rendered point, markers and simulated route included
    pub bounds: BoundingBox,
    /// Great-circle length of the primary line, for display only
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reconstruction {
    /// No telemetry yet; nothing to draw
    NoData,
    Path(RenderedPath),
}

impl Reconstruction {
    pub fn path(&self) -> Option<&RenderedPath> {
        match self {
            Reconstruction::Path(path) => Some(path),
            Reconstruction::NoData => None,
        }
    }
}

pub fn reconstruct(request: &PathRequest) -> Result<Reconstruction, ValidationError> {
    match request {
        PathRequest::Dense { samples } => reconstruct_dense(samples),
        PathRequest::Sparse {
            departure,
            arrival,
            center,
            simulated_route,
        } => reconstruct_sparse(departure, arrival, center, *simulated_route),
    }
}

fn reconstruct_dense(samples: &[LatLon]) -> Result<Reconstruction, ValidationError> {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Ok(Reconstruction::NoData);
    };
    for sample in samples {
        sample.validate()?;
    }

    let Some(bounds) = BoundingBox::around(samples) else {
        return Ok(Reconstruction::NoData);
    };

    Ok(Reconstruction::Path(RenderedPath {
        source: PathSource::Telemetry,
        primary: samples.to_vec(),
        departure: PathMarker {
            kind: MarkerKind::Departure,
            name: None,
            position: *first,
        },
        arrival: PathMarker {
            kind: MarkerKind::Arrival,
            name: None,
            position: *last,
        },
        simulated_route: None,
        bounds,
        distance_km: polyline_length_km(samples),
    }))
}

fn reconstruct_sparse(
    departure: &NamedPoint,
    arrival: &NamedPoint,
    center: &LatLon,
    with_simulated_route: bool,
) -> Result<Reconstruction, ValidationError> {
    departure.position.validate()?;
    arrival.position.validate()?;
    center.validate()?;

    let primary = vec![departure.position, arrival.position];

    let simulated_route = with_simulated_route.then(|| SimulatedRoute {
        points: vec![
            shift_toward(&departure.position, center),
            *center,
            shift_toward(&arrival.position, center),
        ],
        dashed: true,
        label: "simulated",
    });

    let mut bounds = BoundingBox {
        min_lat: departure.position.lat,
        min_lon: departure.position.lon,
        max_lat: departure.position.lat,
        max_lon: departure.position.lon,
    };
    bounds.include(&arrival.position);
    if let Some(route) = &simulated_route {
        for point in &route.points {
            bounds.include(point);
        }
    }

    Ok(Reconstruction::Path(RenderedPath {
        source: PathSource::Endpoints,
        distance_km: polyline_length_km(&primary),
        primary,
        departure: PathMarker {
            kind: MarkerKind::Departure,
            name: departure.name.clone(),
            position: departure.position,
        },
        arrival: PathMarker {
            kind: MarkerKind::Arrival,
            name: arrival.name.clone(),
            position: arrival.position,
        },
        simulated_route,
        bounds,
    }))
}

/// Move `point` up to one degree toward `center` on each axis, never past it
fn shift_toward(point: &LatLon, center: &LatLon) -> LatLon {
    let step = |from: f64, to: f64| {
        let delta = to - from;
        from + delta.signum() * delta.abs().min(SIMULATED_ROUTE_SHIFT_DEG)
    };
    LatLon::new(step(point.lat, center.lat), step(point.lon, center.lon))
}

fn polyline_length_km(points: &[LatLon]) -> f64 {
    points.windows(2).map(|w| w[0].distance_km(&w[1])).sum()
}
