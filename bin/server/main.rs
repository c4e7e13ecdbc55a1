//! Data Product Server
//!
//! Loads the data product metadata, registers with the registrar and serves
//! the metadata API. Metadata changes on disk trigger a reload.

use anyhow::{Context, Result};
use clap::Parser;
use dataproduct_server::config::{DEFAULT_CONFIG, DEFAULT_HOST, DEFAULT_PORT};
use dataproduct_server::{api, AppConfig, AppContext, DirectoryWatcher, ReloadOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dataproduct-server")]
#[command(about = "Data product metadata server")]
struct Args {
    /// Server port (overridden by product.port in the configuration)
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "DATAPRODUCT_PORT")]
    port: u16,

    /// Server host (overridden by product.host in the configuration)
    #[arg(long, default_value = DEFAULT_HOST, env = "DATAPRODUCT_HOST")]
    host: String,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "DATAPRODUCT_CONFIG")]
    configuration: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dataproduct_server=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = AppConfig::load(&args.configuration)
        .with_context(|| format!("Failed to load {}", args.configuration.display()))?;

    // The configuration file wins when it names a listen address
    let (host, port) = match &config.product {
        Some(listen) => (listen.host.clone(), listen.port),
        None => (args.host.clone(), args.port),
    };

    info!("Starting Data Product Server");
    info!("  Configuration: {}", args.configuration.display());
    info!("  Metadata dir: {}", config.metadata.directory.display());
    info!("  Metadata type: {}", config.metadata.kind);
    info!("  Registrar: {}", config.proxy.base_url());
    info!("  Listening on: {}:{}", host, port);

    if !config.metadata.directory.exists() {
        warn!(
            "Metadata directory {} does not exist yet, load will retry",
            config.metadata.directory.display()
        );
    }

    let ctx = Arc::new(AppContext::from_config(&config));

    let changes =
        DirectoryWatcher::new(&config.metadata.directory, config.metadata.watch_interval()).spawn();
    let orchestrator = ReloadOrchestrator::new(ctx.clone());
    tokio::spawn(async move {
        orchestrator.start(changes).await;
    });

    // Start server (blocks until shutdown)
    api::serve(ctx, &host, port).await?;

    info!("Terminating server");
    Ok(())
}
