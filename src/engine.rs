//! Reconciliation engine: the periodic loop that keeps the metric series in
//! step with the lifecycle of the underlying server processes.
//!
//! Per server and per tick the engine moves through a small state machine:
//! a server first seen in the host list or the starter table is a candidate;
//! resolving its process (export check, ping guard, OS open) makes it
//! running; the process vanishing mid-read makes it stopped; a ping failure
//! alone degrades it (running=0, OS handle retained); and a stopped server
//! that the starter no longer declares is retired, its tracked entry dropped
//! and every one of its series deleted.
//!
//! All failures are absorbed at the server boundary: one server's bad tick
//! never affects another server's metrics, and the loop itself only ends
//! with the process.

use crate::directory::{ChannelFactory, DirectoryClient, Registry};
use crate::error::{Error, Result};
use crate::metrics::ServerMetrics;
use crate::process::{ProcessHandle, ProcessInspector};
use crate::starter::{StarterSnapshot, fetch_starter_servers};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// CPU-time total at a known instant, for deriving a usage percentage.
#[derive(Debug, Clone, Copy)]
struct CpuSample {
    total: f64,
    at: Instant,
}

/// Per-identity record of what the engine currently believes about a server.
struct TrackedServer<H> {
    /// Present iff the process is believed alive and was ping-validated when
    /// the PID was acquired.
    process: Option<H>,
    /// Whether the starter currently declares this server controlled.
    controlled: bool,
    /// Starter run level; present only when controlled.
    level: Option<i32>,
    /// Previous tick's CPU totals.
    last_cpu: Option<CpuSample>,
}

impl<H> Default for TrackedServer<H> {
    fn default() -> Self {
        Self {
            process: None,
            controlled: false,
            level: None,
            last_cpu: None,
        }
    }
}

/// The reconciliation engine.
///
/// Owns the tracked-server table, the starter snapshot, and the directory
/// client (including its channel cache); constructed once at startup and
/// driven by [`Engine::run`]. It is the sole writer of gauge values; the
/// exposition endpoint only reads.
pub struct Engine<R, F, P: ProcessInspector> {
    directory: DirectoryClient<R, F, P>,
    metrics: ServerMetrics,
    host: String,
    db: String,
    refresh_ticks: u64,
    starter_device: Option<String>,
    snapshot: StarterSnapshot,
    tracked: HashMap<String, TrackedServer<P::Handle>>,
    ticks: u64,
}

impl<R, F, P> Engine<R, F, P>
where
    R: Registry,
    F: ChannelFactory,
    P: ProcessInspector,
{
    /// Create an engine.
    ///
    /// `host` is the local host as the registry knows it; `db` is the
    /// registry endpoint, used verbatim as the `db` label of every series.
    pub fn new(
        directory: DirectoryClient<R, F, P>,
        metrics: ServerMetrics,
        host: String,
        db: String,
        refresh_ticks: u64,
    ) -> Self {
        Self {
            directory,
            metrics,
            host,
            db,
            refresh_ticks: refresh_ticks.max(1),
            starter_device: None,
            snapshot: StarterSnapshot::new(),
            tracked: HashMap::new(),
            ticks: 0,
        }
    }

    /// One-time startup work: verify the registry is reachable and locate
    /// the starter device.
    ///
    /// A registry failure here propagates and should be fatal; nothing
    /// useful can run without the registry. A missing starter instance is a
    /// configuration precondition of starter-derived metrics and is warned
    /// about exactly once, here.
    #[tracing::instrument(skip(self), fields(host = %self.host))]
    pub async fn initialize(&mut self) -> Result<()> {
        let servers = self.directory.list_local_servers(&self.host).await?;
        tracing::info!(servers = servers.len(), "connected to registry");
        for server in servers {
            self.tracked.entry(server).or_default();
        }

        match self.directory.find_starter_device(&self.host).await {
            Ok(Some(device)) => {
                tracing::info!(device = %device, "found starter device");
                self.starter_device = Some(device);
            }
            Ok(None) => {
                tracing::warn!(
                    "no Starter instance registered for this host; starter metrics will be unavailable"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "could not locate the starter device; starter metrics will be unavailable"
                );
            }
        }
        Ok(())
    }

    /// Drive the engine forever.
    ///
    /// The loop is paced by a fixed interval on the monotonic clock; the
    /// task only suspends at the end-of-tick sleep, so cancelling the future
    /// (e.g. on ctrl-c) never interrupts a tick midway.
    pub async fn run(&mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One reconciliation pass over every tracked server.
    pub async fn tick(&mut self) {
        let started = Instant::now();

        if self.ticks % self.refresh_ticks == 0 {
            self.refresh_directory().await;
        }

        let mut names: Vec<String> = self.tracked.keys().cloned().collect();
        names.sort();

        // Two-phase removal: collect identities to retire during the scan,
        // drop their series afterwards.
        let mut retired = Vec::new();
        for name in names {
            if !self.observe_server(&name).await {
                retired.push(name);
            }
        }
        for name in retired {
            let labels = [self.host.as_str(), name.as_str(), self.db.as_str()];
            self.metrics.remove_server_series(&labels);
            tracing::info!(server = %name, "retired server and its metric series");
        }

        self.metrics.tick_duration.set(started.elapsed().as_secs_f64());
        self.ticks += 1;
    }

    /// Names of the servers currently tracked, sorted.
    pub fn tracked_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tracked.keys().cloned().collect();
        names.sort();
        names
    }

    /// Refresh the host server list and the starter snapshot.
    ///
    /// Either refresh failing leaves the previous view in effect; a tick
    /// with stale directory data beats a tick with none.
    async fn refresh_directory(&mut self) {
        match self.directory.list_local_servers(&self.host).await {
            Ok(servers) => {
                for server in servers {
                    self.tracked.entry(server).or_default();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "registry unavailable; keeping previous server view");
            }
        }

        let Some(device) = self.starter_device.clone() else {
            return;
        };
        let channel = match self.directory.device_channel(&device) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(error = %e, device = %device, "could not open starter channel");
                return;
            }
        };
        match fetch_starter_servers(channel.as_ref()).await {
            Ok(snapshot) => {
                // Servers the starter declares are tracked even when no
                // process was ever resolved for them.
                for server in snapshot.keys() {
                    self.tracked.entry(server.clone()).or_default();
                }
                self.snapshot = snapshot;
            }
            Err(e) => {
                tracing::warn!(error = %e, "starter snapshot fetch failed; keeping previous snapshot");
            }
        }
    }

    /// Observe one server and update its series. Returns `false` when the
    /// server should be retired.
    async fn observe_server(&mut self, name: &str) -> bool {
        let mut entry = self.tracked.remove(name).unwrap_or_default();
        let labels = [self.host.as_str(), name, self.db.as_str()];

        match self.snapshot.get(name) {
            Some(declared) => {
                entry.controlled = true;
                entry.level = Some(declared.level);
            }
            None => {
                entry.controlled = false;
                entry.level = None;
            }
        }

        self.metrics
            .starter_controlled
            .with_label_values(&labels)
            .set(if entry.controlled { 1.0 } else { 0.0 });
        match entry.level {
            Some(level) => {
                self.metrics
                    .starter_level
                    .with_label_values(&labels)
                    .set(f64::from(level));
            }
            None => self.metrics.remove_starter_level(&labels),
        }

        if entry.process.is_none() {
            match self.directory.resolve_process(name).await {
                Ok(handle) => entry.process = handle,
                Err(e) => {
                    tracing::debug!(server = %name, error = %e, "could not resolve process this tick");
                }
            }
        }

        let stats_read = entry.process.as_ref().map(|handle| handle.stats());
        if let Some(read) = stats_read {
            match read {
                Ok(stats) => {
                    self.metrics
                        .cpu_time_user
                        .with_label_values(&labels)
                        .set(stats.cpu_user);
                    self.metrics
                        .cpu_time_system
                        .with_label_values(&labels)
                        .set(stats.cpu_system);
                    self.metrics
                        .mem_rss
                        .with_label_values(&labels)
                        .set(stats.rss_bytes as f64);
                    if let Some(data) = stats.data_bytes {
                        self.metrics
                            .mem_data
                            .with_label_values(&labels)
                            .set(data as f64);
                    }
                    self.metrics
                        .threads_n
                        .with_label_values(&labels)
                        .set(stats.threads as f64);

                    let total = stats.cpu_user + stats.cpu_system;
                    let now = Instant::now();
                    let percent = entry
                        .last_cpu
                        .map(|prev| {
                            let elapsed = now.duration_since(prev.at).as_secs_f64();
                            if elapsed > 0.0 {
                                ((total - prev.total) / elapsed * 100.0).max(0.0)
                            } else {
                                0.0
                            }
                        })
                        .unwrap_or(0.0);
                    entry.last_cpu = Some(CpuSample { total, at: now });
                    self.metrics
                        .cpu_percent
                        .with_label_values(&labels)
                        .set(percent);

                    // OS-alive and control-responsive are separate facts: the
                    // ping is re-probed every tick, independently of the
                    // handle the PID was originally validated through.
                    match self.directory.ping_server(name).await {
                        Ok(rtt) => {
                            self.metrics
                                .dserver_ping
                                .with_label_values(&labels)
                                .set(rtt.as_micros() as f64);
                            self.metrics.running.with_label_values(&labels).set(1.0);
                        }
                        Err(e) => {
                            tracing::debug!(
                                server = %name,
                                error = %e,
                                "admin device unresponsive while process is alive"
                            );
                            self.metrics
                                .dserver_ping
                                .with_label_values(&labels)
                                .set(-1.0);
                            self.metrics.running.with_label_values(&labels).set(0.0);
                        }
                    }
                }
                Err(Error::ProcessGone(pid)) => {
                    tracing::info!(server = %name, pid, "process gone");
                    entry.process = None;
                    entry.last_cpu = None;
                    self.metrics.remove_process_series(&labels);
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "process inspection failed");
                }
            }
        }

        if entry.process.is_none() {
            if !entry.controlled {
                // Gone from the process view and nobody expects it to exist:
                // the caller deletes every series under this label tuple.
                return false;
            }
            // Expected but down: keep the running series alive at 0 so the
            // scrape shows the outage instead of silently dropping the row.
            self.metrics.running.with_label_values(&labels).set(0.0);
        }

        self.tracked.insert(name.to_string(), entry);
        true
    }
}
