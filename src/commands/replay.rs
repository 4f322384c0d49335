use anyhow::{Context, Result};
use flightdeck::config::FlightdeckConfig;
use flightdeck::live_tracker::LiveFlightTracker;
use flightdeck::report_sources::{JsonLinesReportSource, replay};
use std::path::Path;
use tracing::info;

pub async fn handle_replay(config: FlightdeckConfig, file: &Path, show_active: bool) -> Result<()> {
    let tracker = LiveFlightTracker::new(config.tracker_settings());
    let mut source = JsonLinesReportSource::from_file(file)
        .await
        .with_context(|| format!("Failed to open report file {:?}", file))?;

    let summary = replay(&tracker, &mut source).await?;
    let deactivated = tracker.run_maintenance();
    info!("Maintenance pass after replay deactivated {} flights", deactivated);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if show_active {
        println!("{}", serde_json::to_string_pretty(&tracker.list_active())?);
    }
    Ok(())
}
