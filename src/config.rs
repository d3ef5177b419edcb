//! Runtime configuration for the exporter.
//!
//! There is no configuration file. Everything the exporter needs comes from
//! three environment variables: `TANGO_HOST` (the REST gateway in front of
//! the TANGO database), and optionally `TANGO_EXPORTER_BIND` /
//! `TANGO_EXPORTER_PORT` for the exposition endpoint. Everything else is a
//! fixed default.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default TCP port of the metrics exposition endpoint.
pub const DEFAULT_PORT: u16 = 9110;

/// Default period of the process-metrics tick.
pub const DEFAULT_METRICS_PERIOD: Duration = Duration::from_secs(1);

/// Default cadence of directory refreshes (host server list and starter
/// snapshot), counted in metrics ticks.
pub const DEFAULT_REFRESH_TICKS: u64 = 60;

/// Exporter settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the exposition endpoint binds to.
    pub bind_address: String,
    /// Port the exposition endpoint binds to.
    pub port: u16,
    /// Address of the TANGO REST gateway, `host:port` or a full URL.
    pub tango_host: String,
    /// Period of the process-metrics tick.
    pub metrics_period: Duration,
    /// Directory refresh cadence, in ticks.
    pub refresh_ticks: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tango_host: String::new(),
            metrics_period: DEFAULT_METRICS_PERIOD,
            refresh_ticks: DEFAULT_REFRESH_TICKS,
        }
    }
}

impl Config {
    /// Build a configuration from the environment.
    ///
    /// `TANGO_HOST` is required; the exporter cannot do anything useful
    /// without a registry to ask.
    pub fn from_env() -> Result<Self> {
        let tango_host = std::env::var("TANGO_HOST")
            .map_err(|_| Error::Other("TANGO_HOST is not set".to_string()))?;

        let mut config = Config {
            tango_host,
            ..Config::default()
        };

        if let Ok(bind) = std::env::var("TANGO_EXPORTER_BIND") {
            config.bind_address = bind;
        }
        if let Ok(port) = std::env::var("TANGO_EXPORTER_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Other(format!("invalid TANGO_EXPORTER_PORT: {}", port)))?;
        }

        Ok(config)
    }
}

/// Name of the local host, as the registry knows it.
///
/// Reads `/etc/hostname` first, then the `HOSTNAME` environment variable,
/// and falls back to `localhost`.
pub fn local_hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}
