use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::collaborators::{InMemoryProfileDirectory, Profile};
use crate::live_tracker::{RestartPolicy, TrackerSettings};

/// Operator profile, TOML file layer (snake_case)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlProfile {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<TomlProfile> for Profile {
    fn from(t: TomlProfile) -> Self {
        Self {
            display_name: t.display_name,
            email: t.email,
        }
    }
}

/// Top-level configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightdeckConfig {
    /// Seconds without a report before a flight is stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Seconds a report's time may run ahead of the server clock
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_base_url: Option<String>,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Static operator profiles keyed by user id, used to label the live map
    #[serde(default)]
    pub profiles: BTreeMap<String, TomlProfile>,
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_maintenance_interval_secs() -> u64 {
    30
}

fn default_max_clock_skew_secs() -> u64 {
    300
}

fn default_bind_address() -> String {
    "127.0.0.1:1337".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

impl Default for FlightdeckConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            restart_policy: RestartPolicy::default(),
            max_clock_skew_secs: default_max_clock_skew_secs(),
            bind_address: default_bind_address(),
            metrics_port: None,
            telemetry_base_url: None,
            upstream_timeout_secs: default_upstream_timeout_secs(),
            profiles: BTreeMap::new(),
        }
    }
}

impl FlightdeckConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: FlightdeckConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Load config from a TOML file, falling back to defaults when it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            Self::load(path)
        } else {
            debug!("No configuration file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply `FLIGHTDECK_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(secs) = env_u64("FLIGHTDECK_STALE_AFTER_SECS")? {
            self.stale_after_secs = secs;
        }
        if let Some(secs) = env_u64("FLIGHTDECK_MAINTENANCE_INTERVAL_SECS")? {
            self.maintenance_interval_secs = secs;
        }
        if let Some(secs) = env_u64("FLIGHTDECK_MAX_CLOCK_SKEW_SECS")? {
            self.max_clock_skew_secs = secs;
        }
        if let Ok(bind) = std::env::var("FLIGHTDECK_BIND") {
            self.bind_address = bind;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.stale_after_secs == 0 {
            bail!("stale_after_secs must be greater than zero");
        }
        if self.maintenance_interval_secs == 0 {
            bail!("maintenance_interval_secs must be greater than zero");
        }
        if self.upstream_timeout_secs == 0 {
            bail!("upstream_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            stale_after: chrono::Duration::seconds(self.stale_after_secs as i64),
            restart_policy: self.restart_policy,
            max_clock_skew: chrono::Duration::seconds(self.max_clock_skew_secs as i64),
        }
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn profile_directory(&self) -> InMemoryProfileDirectory {
        InMemoryProfileDirectory::new(
            self.profiles
                .iter()
                .map(|(id, p)| (id.clone(), Profile::from(p.clone())))
                .collect(),
        )
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{} must be a whole number of seconds, got {:?}", name, value)),
        Err(_) => Ok(None),
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `FLIGHTDECK_CONFIG` env var
/// 2. `/etc/flightdeck/flightdeck.toml` (production/staging)
/// 3. `./flightdeck.toml` (development)
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FLIGHTDECK_CONFIG") {
        return PathBuf::from(path);
    }

    match std::env::var("FLIGHTDECK_ENV").as_deref() {
        Ok("production") | Ok("staging") => PathBuf::from("/etc/flightdeck/flightdeck.toml"),
        _ => PathBuf::from("./flightdeck.toml"),
    }
}

/// Load, override from the environment and validate
pub fn load_config(explicit_path: Option<&Path>) -> Result<FlightdeckConfig> {
    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_path);
    let mut config = FlightdeckConfig::load_or_default(&path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
