//! Flightdeck - live flight state store
//!
//! Keeps the latest known state of every in-progress flight, keyed by operator and
//! callsign, and reconstructs renderable map paths from telemetry or endpoints.

pub mod actions;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod geometry;
pub mod live_flights;
pub mod live_tracker;
pub mod log_format;
pub mod metrics;
pub mod report_sources;
pub mod web;
