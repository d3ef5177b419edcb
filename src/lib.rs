/*!
 # TANGO exporter

 A Prometheus exporter for the TANGO device servers running on the local
 host. It relies on the TANGO database (via a REST gateway) to learn which
 servers should exist, on the host's Starter device for the declared run
 levels, and on procfs for per-process resource usage.

 ## Overview

 The exporter is built around three components composed in one periodic
 control loop:

 - A **directory client** ([`directory`]) that turns server identities into
   facts: the host's server list, export/PID metadata, and control-channel
   liveness, with a process-wide cache of device channels.
 - A **starter snapshot** ([`starter`]) of the supervisor's declared server
   table, refreshed on a coarse cadence.
 - A **reconciliation engine** ([`engine`]) that resolves the disagreement
   between what should run and what does run every tick, guarding against
   PID reuse, and creates/updates/retires the gauge series accordingly.

 The metric series live in a shared [`prometheus::Registry`] served by the
 [`exposition`] endpoint on `GET /metrics` (default port 9110).

 ## Basic usage

 ```no_run
 use tango_exporter::config::{Config, local_hostname};
 use tango_exporter::directory::DirectoryClient;
 use tango_exporter::directory::rest::{RestChannelFactory, RestRegistry};
 use tango_exporter::engine::Engine;
 use tango_exporter::metrics::ServerMetrics;
 use tango_exporter::process::ProcfsInspector;

 #[tokio::main]
 async fn main() -> tango_exporter::Result<()> {
     let config = Config::from_env()?;
     let registry = prometheus::Registry::new();
     let metrics = ServerMetrics::new(&registry)?;

     let db = RestRegistry::new(&config.tango_host)?;
     let endpoint = db.endpoint().to_string();
     let directory = DirectoryClient::new(
         db,
         RestChannelFactory::new(&config.tango_host)?,
         ProcfsInspector::new(),
     );

     let mut engine = Engine::new(
         directory,
         metrics,
         local_hostname(),
         endpoint,
         config.refresh_ticks,
     );
     engine.initialize().await?;
     engine.run(config.metrics_period).await;
     Ok(())
 }
 ```
*/

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod exposition;
pub mod metrics;
pub mod process;
pub mod starter;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use metrics::ServerMetrics;
