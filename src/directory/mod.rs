//! Directory client: translates host/server identity into actionable
//! OS-level and control-channel facts.
//!
//! The client is generic over three collaborator seams so the engine and the
//! tests can run against fakes:
//!
//! * [`Registry`]: the TANGO database (server lists, import metadata, class
//!   lists).
//! * [`DeviceChannel`] / [`ChannelFactory`]: lazily-created connections to
//!   device control channels, cached by device path for the life of the
//!   process.
//! * [`crate::process::ProcessInspector`]: OS process handles.
//!
//! The production implementations live in [`rest`].

pub mod rest;

use crate::error::{Error, Result};
use crate::process::ProcessInspector;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Class name of the per-host supervisor device.
pub const STARTER_CLASS: &str = "Starter";

/// Export metadata of a device, as the registry reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportInfo {
    /// Whether the device is currently exported.
    pub exported: bool,
    /// PID of the hosting process. Only meaningful when exported, and only
    /// trustworthy after a successful control-channel ping.
    pub pid: i32,
}

/// One (device, class) pair from a server's class list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClass {
    /// Device name, e.g. `tango/admin/host01`.
    pub device: String,
    /// Class name, e.g. `Starter`.
    pub class: String,
}

/// Query interface of the TANGO database.
///
/// Every failure maps to [`Error::RegistryUnavailable`]; the engine treats
/// that as "no information this tick", never as fatal (except at startup).
#[async_trait]
pub trait Registry: Send + Sync {
    /// All servers registered to the given host.
    async fn host_servers(&self, host: &str) -> Result<Vec<String>>;

    /// Export metadata of the given device.
    async fn import_info(&self, device: &str) -> Result<ImportInfo>;

    /// The (device, class) list of the given server.
    async fn class_list(&self, server: &str) -> Result<Vec<DeviceClass>>;
}

/// A connection to one device's control channel.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Liveness probe. Returns the round-trip time on success.
    async fn ping(&self) -> Result<Duration>;

    /// Read a string-spectrum attribute.
    async fn read_spectrum(&self, attribute: &str) -> Result<Vec<String>>;
}

/// Creates control channels. Creation is cheap and lazy; real I/O happens on
/// first use of the channel.
pub trait ChannelFactory: Send + Sync {
    /// Open a channel addressed to the given device path.
    fn open(&self, device: &str) -> Result<Arc<dyn DeviceChannel>>;
}

/// Name of the admin device through which a running server is pinged.
pub fn admin_device(server: &str) -> String {
    format!("dserver/{}", server)
}

/// Cache of established control channels, keyed by device path.
///
/// At most one channel per path; channels live as long as the process and are
/// never explicitly torn down.
struct ChannelCache<F> {
    factory: F,
    channels: HashMap<String, Arc<dyn DeviceChannel>>,
}

impl<F: ChannelFactory> ChannelCache<F> {
    fn new(factory: F) -> Self {
        Self {
            factory,
            channels: HashMap::new(),
        }
    }

    fn get_or_open(&mut self, device: &str) -> Result<Arc<dyn DeviceChannel>> {
        if let Some(channel) = self.channels.get(device) {
            return Ok(Arc::clone(channel));
        }
        let channel = self.factory.open(device)?;
        self.channels.insert(device.to_string(), Arc::clone(&channel));
        Ok(channel)
    }
}

/// Directory client over a registry, a channel factory, and a process
/// inspector.
pub struct DirectoryClient<R, F, P> {
    registry: R,
    channels: ChannelCache<F>,
    inspector: P,
}

impl<R, F, P> DirectoryClient<R, F, P>
where
    R: Registry,
    F: ChannelFactory,
    P: ProcessInspector,
{
    /// Create a client. The channel cache starts empty and fills lazily.
    pub fn new(registry: R, factory: F, inspector: P) -> Self {
        Self {
            registry,
            channels: ChannelCache::new(factory),
            inspector,
        }
    }

    /// All servers registered to `host`, as a sorted set.
    pub async fn list_local_servers(&self, host: &str) -> Result<BTreeSet<String>> {
        let servers = self.registry.host_servers(host).await?;
        Ok(servers.into_iter().collect())
    }

    /// Resolve the live, verified process behind a server, if any.
    ///
    /// Not exported means not running, without waking the device. Exported
    /// but un-pingable also means not running: the registry's PID may belong
    /// to an unrelated process after a crash and PID recycling, so a bare PID
    /// is never trusted. Only after a successful ping is an OS handle opened;
    /// the process vanishing between the ping and the open resolves to not
    /// running as well.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_process(&mut self, server: &str) -> Result<Option<P::Handle>> {
        let device = admin_device(server);
        let info = self.registry.import_info(&device).await?;
        if !info.exported {
            tracing::trace!("server not exported");
            return Ok(None);
        }

        let channel = self.channels.get_or_open(&device)?;
        if let Err(e) = channel.ping().await {
            tracing::debug!(error = %e, pid = info.pid, "admin device did not answer; not trusting pid");
            return Ok(None);
        }

        match self.inspector.open(info.pid) {
            Ok(handle) => Ok(Some(handle)),
            Err(Error::ProcessGone(pid)) => {
                tracing::debug!(pid, "process vanished between ping and open");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Ping a server's admin device, reusing the cached channel.
    pub async fn ping_server(&mut self, server: &str) -> Result<Duration> {
        let channel = self.channels.get_or_open(&admin_device(server))?;
        channel.ping().await
    }

    /// Channel to an arbitrary device, through the cache.
    pub fn device_channel(&mut self, device: &str) -> Result<Arc<dyn DeviceChannel>> {
        self.channels.get_or_open(device)
    }

    /// Find the host's starter device, if one is registered.
    ///
    /// Scans the host's server list for the `Starter/...` instance and
    /// returns its device of class `Starter`. Absence is a configuration
    /// precondition of starter-derived metrics, not a transient failure.
    pub async fn find_starter_device(&self, host: &str) -> Result<Option<String>> {
        let servers = self.registry.host_servers(host).await?;
        for server in servers {
            if !server.starts_with("Starter/") {
                continue;
            }
            let classes = self.registry.class_list(&server).await?;
            if let Some(entry) = classes.into_iter().find(|c| c.class == STARTER_CLASS) {
                return Ok(Some(entry.device));
            }
        }
        Ok(None)
    }
}
