use anyhow::{Context, Result};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Buckets: 0.05ms .. 250ms, upserts are in-memory and should sit at the low end
        .set_buckets_for_metric(
            Matcher::Full("live_flights.upsert_ms".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 100.0, 250.0],
        )
        .context("failed to set buckets for live_flights.upsert_ms")?
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .context("failed to set buckets for http_request_duration_seconds")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Background task to update process metrics every 5 seconds
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status")
                && let Some(kb) = status
                    .lines()
                    .find(|line| line.starts_with("VmRSS:"))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<f64>().ok())
            {
                metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Initialize live flight metrics to zero so they show up in Prometheus before
/// the first report arrives
pub fn initialize_live_metrics() {
    for outcome in [
        "inserted",
        "updated",
        "terminated",
        "restarted",
        "superseded",
        "unchanged",
    ] {
        metrics::counter!("live_flights.upserts_total", "outcome" => outcome).absolute(0);
    }
    metrics::counter!("live_flights.validation_rejected_total").absolute(0);
    metrics::counter!("live_flights.upstream_errors_total").absolute(0);
    metrics::counter!("live_flights.maintenance_deactivated_total").absolute(0);
    metrics::gauge!("live_flights.tracked").set(0.0);
    metrics::gauge!("live_flights.active").set(0.0);
}

/// Start a standalone metrics server on the specified port
pub async fn start_metrics_server(port: u16) -> Result<()> {
    let handle = init_metrics()?;
    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics handle already initialized");
    }
    initialize_live_metrics();

    tokio::spawn(process_metrics_task());

    let app = Router::new().route(
        "/metrics",
        get(|| async {
            METRICS_HANDLE
                .get()
                .map(PrometheusHandle::render)
                .unwrap_or_default()
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}
