use anyhow::Context;
use tango_exporter::config::{Config, local_hostname};
use tango_exporter::directory::DirectoryClient;
use tango_exporter::directory::rest::{RestChannelFactory, RestRegistry};
use tango_exporter::engine::Engine;
use tango_exporter::exposition;
use tango_exporter::metrics::ServerMetrics;
use tango_exporter::process::ProcfsInspector;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let host = local_hostname();
    info!(host = %host, tango_host = %config.tango_host, "starting tango exporter");

    let registry = prometheus::Registry::new();
    let metrics = ServerMetrics::new(&registry).context("failed to register metrics")?;

    let db = RestRegistry::new(&config.tango_host).context("invalid TANGO_HOST")?;
    let endpoint = db.endpoint().to_string();
    let factory = RestChannelFactory::new(&config.tango_host).context("invalid TANGO_HOST")?;
    let directory = DirectoryClient::new(db, factory, ProcfsInspector::new());

    let mut engine = Engine::new(directory, metrics, host, endpoint, config.refresh_ticks);
    engine
        .initialize()
        .await
        .context("cannot reach the TANGO registry")?;

    // Bind failure is fatal: nothing useful can run without the endpoint.
    let server = exposition::serve(&config.bind_address, config.port, registry)
        .context("cannot start the metrics endpoint")?;
    let server_task = tokio::spawn(server);

    tokio::select! {
        _ = engine.run(config.metrics_period) => unreachable!("reconciliation loop ended"),
        result = server_task => {
            result
                .context("metrics endpoint task failed")?
                .context("metrics endpoint exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; exiting");
        }
    }

    Ok(())
}
