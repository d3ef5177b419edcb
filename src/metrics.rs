//! Prometheus metrics definitions for the exporter.
//!
//! One gauge family per observed fact, all labeled `(host, server, db)`.
//! Series are created lazily on first set and retired explicitly with
//! [`ServerMetrics::remove_process_series`] /
//! [`ServerMetrics::remove_server_series`]; a series' existence is a function
//! of what has been observed and retired, never of what is merely tracked.

use crate::error::{Error, Result};
use prometheus::{Gauge, GaugeVec, Opts, Registry};

/// Label names shared by every per-server gauge, in label-tuple order.
pub const LABEL_NAMES: [&str; 3] = ["host", "server", "db"];

/// Collection of the exporter's Prometheus metrics.
#[derive(Clone)]
pub struct ServerMetrics {
    /// Server is running (process alive and control channel responsive).
    pub running: GaugeVec,
    /// Process user CPU time, seconds.
    pub cpu_time_user: GaugeVec,
    /// Process system CPU time, seconds.
    pub cpu_time_system: GaugeVec,
    /// Process CPU usage over the last tick, percent.
    pub cpu_percent: GaugeVec,
    /// Process resident set size, bytes.
    pub mem_rss: GaugeVec,
    /// Process data segment size, bytes.
    pub mem_data: GaugeVec,
    /// Process thread count.
    pub threads_n: GaugeVec,
    /// Admin-device round-trip ping, microseconds; -1 when unreachable.
    pub dserver_ping: GaugeVec,
    /// Server is declared controlled by the starter.
    pub starter_controlled: GaugeVec,
    /// Starter run level of the server.
    pub starter_level: GaugeVec,
    /// Duration of the last reconciliation tick, seconds.
    pub tick_duration: Gauge,
}

fn server_gauge(name: &str, help: &str) -> Result<GaugeVec> {
    GaugeVec::new(Opts::new(name, help), &LABEL_NAMES)
        .map_err(|e| Error::Metrics(e.to_string()))
}

impl ServerMetrics {
    /// Creates and registers all exporter metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self> {
        let running = server_gauge("tango_server_running", "TANGO server is running")?;
        let cpu_time_user = server_gauge(
            "tango_server_cpu_time_user",
            "TANGO server process user CPU time in seconds",
        )?;
        let cpu_time_system = server_gauge(
            "tango_server_cpu_time_system",
            "TANGO server process system CPU time in seconds",
        )?;
        let cpu_percent = server_gauge(
            "tango_server_cpu_percent",
            "TANGO server process CPU percentage over the last tick",
        )?;
        let mem_rss = server_gauge(
            "tango_server_mem_rss",
            "TANGO server process resident set size in bytes",
        )?;
        let mem_data = server_gauge(
            "tango_server_mem_data",
            "TANGO server process data segment size in bytes",
        )?;
        let threads_n = server_gauge(
            "tango_server_threads_n",
            "TANGO server process number of threads",
        )?;
        let dserver_ping = server_gauge(
            "tango_server_dserver_ping",
            "Round-trip ping of the server's admin device in microseconds, -1 if unreachable",
        )?;
        let starter_controlled = server_gauge(
            "tango_server_starter_controlled",
            "TANGO server is controlled by the starter",
        )?;
        let starter_level = server_gauge(
            "tango_server_starter_level",
            "TANGO server starter run level",
        )?;
        let tick_duration = Gauge::new(
            "tango_exporter_tick_duration_seconds",
            "Duration of the last reconciliation tick in seconds",
        )
        .map_err(|e| Error::Metrics(e.to_string()))?;

        for gauge in [
            &running,
            &cpu_time_user,
            &cpu_time_system,
            &cpu_percent,
            &mem_rss,
            &mem_data,
            &threads_n,
            &dserver_ping,
            &starter_controlled,
            &starter_level,
        ] {
            registry
                .register(Box::new(gauge.clone()))
                .map_err(|e| Error::Metrics(e.to_string()))?;
        }
        registry
            .register(Box::new(tick_duration.clone()))
            .map_err(|e| Error::Metrics(e.to_string()))?;

        Ok(Self {
            running,
            cpu_time_user,
            cpu_time_system,
            cpu_percent,
            mem_rss,
            mem_data,
            threads_n,
            dserver_ping,
            starter_controlled,
            starter_level,
            tick_duration,
        })
    }

    /// Retire the process-detail series for one label tuple.
    ///
    /// These series must not outlive the process they describe. Removing a
    /// series that was never created is not an error.
    pub fn remove_process_series(&self, labels: &[&str; 3]) {
        for gauge in [
            &self.cpu_time_user,
            &self.cpu_time_system,
            &self.cpu_percent,
            &self.mem_rss,
            &self.mem_data,
            &self.threads_n,
            &self.dserver_ping,
        ] {
            let _ = gauge.remove_label_values(labels);
        }
    }

    /// Retire every series for one label tuple.
    ///
    /// Used when a server is gone from both the process view and the starter
    /// snapshot and nobody expects it to exist anymore.
    pub fn remove_server_series(&self, labels: &[&str; 3]) {
        self.remove_process_series(labels);
        for gauge in [&self.running, &self.starter_controlled, &self.starter_level] {
            let _ = gauge.remove_label_values(labels);
        }
    }

    /// Retire the starter-level series for one label tuple.
    ///
    /// Called when a server drops out of the starter's declared table while
    /// still being tracked; a stale level must not outlive the declaration
    /// that produced it.
    pub fn remove_starter_level(&self, labels: &[&str; 3]) {
        let _ = self.starter_level.remove_label_values(labels);
    }
}
