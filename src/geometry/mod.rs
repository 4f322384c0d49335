//! Coordinate types and map geometry for rendering flight paths.
//!
//! All coordinates here are `(lat, lon)` in degrees. Sources that use the GeoJSON
//! `[lon, lat]` order go through [`LatLon::from_lon_lat`] first.

pub mod path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use path::{
    MarkerKind, NamedPoint, PathMarker, PathRequest, PathSource, Reconstruction, RenderedPath,
    SimulatedRoute, reconstruct,
};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build from a GeoJSON-ordered `[lon, lat]` pair
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lon: pair[0],
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_axis(self.lat, "lat", 90.0)?;
        check_axis(self.lon, "lon", 180.0)
    }

    /// Great-circle distance in kilometers (haversine)
    pub fn distance_km(&self, other: &LatLon) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

fn check_axis(value: f64, field: &'static str, limit: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field, value });
    }
    if !(-limit..=limit).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: -limit,
            max: limit,
        });
    }
    Ok(())
}

/// Axis-aligned box in degrees, used to fit the map viewport.
///
/// Does not handle paths crossing the antimeridian; such a path gets a box
/// spanning the long way round, which still contains every point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box around the points, or `None` for an empty iterator
    pub fn around<'a>(points: impl IntoIterator<Item = &'a LatLon>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        for point in points {
            bounds.include(point);
        }
        Some(bounds)
    }

    pub fn include(&mut self, point: &LatLon) {
        self.min_lat = self.min_lat.min(point.lat);
        self.min_lon = self.min_lon.min(point.lon);
        self.max_lat = self.max_lat.max(point.lat);
        self.max_lon = self.max_lon.max(point.lon);
    }

    pub fn contains(&self, point: &LatLon) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}
