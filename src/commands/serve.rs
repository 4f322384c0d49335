use anyhow::{Context, Result};
use flightdeck::collaborators::{HttpTelemetrySource, TelemetrySource};
use flightdeck::config::FlightdeckConfig;
use flightdeck::live_tracker::LiveFlightTracker;
use flightdeck::web::{AppState, start_web_server};
use std::sync::Arc;
use tracing::{Instrument, error, info};

pub async fn handle_serve(config: FlightdeckConfig, bind: Option<String>) -> Result<()> {
    let settings = config.tracker_settings();
    info!(
        "Live flights go stale after {}s (restart policy: {:?})",
        settings.stale_after.num_seconds(),
        settings.restart_policy
    );
    let tracker = LiveFlightTracker::new(settings);

    if let Some(port) = config.metrics_port {
        tokio::spawn(
            async move {
                if let Err(e) = flightdeck::metrics::start_metrics_server(port).await {
                    error!("Metrics server exited: {:#}", e);
                }
            }
            .instrument(tracing::info_span!("metrics_server")),
        );
    }

    let telemetry: Option<Arc<dyn TelemetrySource>> = match &config.telemetry_base_url {
        Some(url) => {
            let source = HttpTelemetrySource::new(url, config.upstream_timeout())
                .context("Failed to build telemetry client")?;
            info!("External telemetry feed at {}", url);
            Some(Arc::new(source))
        }
        None => None,
    };

    let maintenance = tracker.start_maintenance_checker(config.maintenance_interval());

    let app_state = AppState {
        tracker,
        profiles: Arc::new(config.profile_directory()),
        telemetry,
    };

    let bind_address = bind.unwrap_or_else(|| config.bind_address.clone());
    let result = start_web_server(&bind_address, app_state).await;

    maintenance.abort();
    result
}
