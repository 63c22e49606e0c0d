mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use nekoproxy_core::{bootstrap::load_config, logging};

use server::RelayServer;

/// HLS-aware media relay
#[derive(Debug, Parser)]
#[command(name = "nekoproxy", version, about)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, env = "NEKOPROXY_CONFIG_PATH")]
    config: Option<String>,

    /// Address to bind, overrides server.host
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides server.http_port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.http_port = port;
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("NekoProxy starting...");
    info!("HTTP address: {}", config.http_address());
    info!(
        allowed_types = ?config.media.allowed_types,
        public_scheme = %config.server.public_scheme,
        "Relay configured"
    );

    // 3. Serve until a shutdown signal arrives
    RelayServer::new(config).start().await
}
