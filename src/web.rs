use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::actions;
use crate::collaborators::{ProfileDirectory, TelemetrySource};
use crate::live_tracker::LiveFlightTracker;

// App state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub tracker: LiveFlightTracker,
    pub profiles: Arc<dyn ProfileDirectory>,
    /// External pilot feed, when one is configured
    pub telemetry: Option<Arc<dyn TelemetrySource>>,
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    metrics::histogram!("http_request_duration_seconds").record(duration.as_secs_f64());
    if status.is_server_error() {
        error!(
            "HTTP {} error on {} {} [{}]",
            status.as_u16(),
            method,
            path,
            request_id
        );
    }

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

/// Build the application router. Split out from [`start_web_server`] so tests can
/// drive it without binding a socket.
pub fn build_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route(
            "/live-flights",
            get(actions::list_live_flights).post(actions::ingest_live_flight),
        )
        .route(
            "/live-flights/{user_id}/{callsign}",
            get(actions::get_live_flight),
        )
        .route(
            "/live-flights/{user_id}/{callsign}/path",
            post(actions::live_flight_path),
        )
        .route(
            "/live-flights/external/{pilot_id}",
            post(actions::ingest_external_pilot),
        )
        .route("/paths", post(actions::reconstruct_path))
        .route("/status", get(actions::get_status))
        .with_state(app_state);

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
}

pub async fn start_web_server(bind_address: &str, app_state: AppState) -> Result<()> {
    info!("Starting web server on {}", bind_address);
    actions::init_server_start_time();

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind web server to {}", bind_address))?;
    info!("Web server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
