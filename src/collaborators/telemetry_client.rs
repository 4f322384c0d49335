use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{ExternalPilot, TelemetrySource};
use crate::error::UpstreamError;

const SERVICE: &str = "telemetry feed";

/// Telemetry source that fetches `{base_url}/pilots/{pilot_id}` as JSON
pub struct HttpTelemetrySource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTelemetrySource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flightdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Request {
                service: SERVICE,
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout {
                service: SERVICE,
                timeout_secs: self.timeout.as_secs(),
            }
        } else if e.is_decode() {
            UpstreamError::Decode {
                service: SERVICE,
                message: e.to_string(),
            }
        } else {
            UpstreamError::Request {
                service: SERVICE,
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn pilot(&self, pilot_id: &str) -> Result<Option<ExternalPilot>, UpstreamError> {
        let url = format!("{}/pilots/{}", self.base_url, pilot_id);
        debug!("Fetching live pilot data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            }),
            _ => {
                let pilot = response
                    .json::<ExternalPilot>()
                    .await
                    .map_err(|e| self.map_error(e))?;
                Ok(Some(pilot))
            }
        }
    }
}
