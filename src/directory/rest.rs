//! Production directory implementations over a TANGO REST gateway.
//!
//! There are no native TANGO bindings for Rust, so the exporter reaches both
//! the database and the device control channels through the REST gateway
//! named by `TANGO_HOST`. Every request carries a bounded timeout; a slow
//! gateway degrades one probe, not the whole exporter.

use crate::directory::{ChannelFactory, DeviceChannel, DeviceClass, ImportInfo, Registry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-request timeout of every gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

fn base_url(gateway: &str) -> String {
    let trimmed = gateway.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::Other(format!("failed to build HTTP client: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ImportInfoBody {
    exported: bool,
    pid: i32,
}

#[derive(Debug, Deserialize)]
struct DeviceClassBody {
    device: String,
    class: String,
}

/// Registry client over the REST gateway.
pub struct RestRegistry {
    client: reqwest::Client,
    base: String,
}

impl RestRegistry {
    /// Create a registry client for the given gateway address (`host:port`
    /// or a full URL).
    pub fn new(gateway: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: base_url(gateway),
        })
    }

    /// The endpoint string used as the `db` metric label.
    pub fn endpoint(&self) -> &str {
        &self.base
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::RegistryUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::RegistryUnavailable(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl Registry for RestRegistry {
    async fn host_servers(&self, host: &str) -> Result<Vec<String>> {
        self.get_json(&format!("/hosts/{}/servers", host)).await
    }

    async fn import_info(&self, device: &str) -> Result<ImportInfo> {
        let body: ImportInfoBody = self.get_json(&format!("/devices/{}/import", device)).await?;
        Ok(ImportInfo {
            exported: body.exported,
            pid: body.pid,
        })
    }

    async fn class_list(&self, server: &str) -> Result<Vec<DeviceClass>> {
        let body: Vec<DeviceClassBody> =
            self.get_json(&format!("/servers/{}/classes", server)).await?;
        Ok(body
            .into_iter()
            .map(|c| DeviceClass {
                device: c.device,
                class: c.class,
            })
            .collect())
    }
}

/// Channel factory producing REST-backed control channels.
///
/// Channels share one HTTP client; "opening" a channel allocates nothing but
/// the address, so creation stays cheap and lazy.
pub struct RestChannelFactory {
    client: reqwest::Client,
    base: String,
}

impl RestChannelFactory {
    /// Create a factory for the given gateway address.
    pub fn new(gateway: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: base_url(gateway),
        })
    }
}

impl ChannelFactory for RestChannelFactory {
    fn open(&self, device: &str) -> Result<Arc<dyn DeviceChannel>> {
        Ok(Arc::new(RestChannel {
            client: self.client.clone(),
            base: self.base.clone(),
            device: device.to_string(),
        }))
    }
}

/// Control channel of one device, addressed through the gateway.
pub struct RestChannel {
    client: reqwest::Client,
    base: String,
    device: String,
}

#[async_trait]
impl DeviceChannel for RestChannel {
    async fn ping(&self) -> Result<Duration> {
        let url = format!("{}/devices/{}/ping", self.base, self.device);
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DeviceUnreachable(format!("{}: {}", self.device, e)))?;
        if !response.status().is_success() {
            return Err(Error::DeviceUnreachable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(started.elapsed())
    }

    async fn read_spectrum(&self, attribute: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/devices/{}/attributes/{}/value",
            self.base, self.device, attribute
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DeviceUnreachable(format!("{}: {}", self.device, e)))?;
        if !response.status().is_success() {
            return Err(Error::Attribute(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Attribute(format!("{}: {}", url, e)))
    }
}
