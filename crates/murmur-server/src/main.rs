use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use murmur_server::{server, telemetry, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Murmur chat server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Listen address (overrides MURMUR_BIND_ADDR)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Keep only the newest N messages, 0 for unbounded (overrides MURMUR_HISTORY_LIMIT)
    #[arg(long)]
    history_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut server_config = ServerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load server configuration: {}", e))?;
    if let Some(bind) = cli.bind {
        server_config.bind_addr = bind;
    }
    if let Some(limit) = cli.history_limit {
        server_config.history_limit = (limit > 0).then_some(limit);
    }

    telemetry::init(server_config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to init telemetry: {}", e))?;

    info!("Murmur Server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    server_config.log_config();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    server::start(server_config, shutdown).await?;

    info!("Graceful shutdown complete");
    Ok(())
}
