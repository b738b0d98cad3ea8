//! httplog demo server.
//!
//! Serves a few demo routes behind the capture layer and logs every
//! request/response pair through `tracing`.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use httplog::config::{load_config, validate_config, ConfigError, HttplogConfig};
use httplog::observability::logging;
use httplog::{HttpServer, Shutdown, TracingLogSink};

#[derive(Parser)]
#[command(name = "httplog")]
#[command(about = "HTTP server that logs every request and response", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HttplogConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, TracingLogSink);
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown.trigger_on_ctrl_c().await;
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
