// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! wacli REST API server binary

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use wa_logging::CliLoggingArgs;
use wa_rest_server::config::{PairingArgs, default_store_dir, parse_api_keys};
use wa_rest_server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "wacli REST API server", long_about = None)]
struct Args {
    /// Interface to listen on
    #[arg(long, env = "WACLI_API_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "WACLI_API_PORT", default_value_t = 8080)]
    port: u16,

    /// Comma separated list of accepted API keys
    #[arg(long, env = "WACLI_API_KEYS", hide_env_values = true)]
    api_keys: String,

    /// Directory holding the linked device credentials (default: ~/.wacli)
    #[arg(long, env = "WACLI_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Base URL of the platform bridge
    #[arg(long, env = "WACLI_BRIDGE_URL", default_value = "http://127.0.0.1:8765")]
    bridge_url: String,

    /// Enable permissive CORS
    #[arg(long, env = "WACLI_API_CORS")]
    cors: bool,

    #[command(flatten)]
    pairing: PairingArgs,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    args.logging.init("wacli-api")?;

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.host, args.port),
        api_keys: parse_api_keys(&args.api_keys),
        store_dir: args.store_dir.unwrap_or_else(default_store_dir),
        bridge_url: args.bridge_url,
        enable_cors: args.cors,
        pairing: args.pairing.into_config(),
    };
    config.validate()?;

    tracing::info!(
        bind = %config.bind_addr,
        store_dir = %config.store_dir.display(),
        api_keys = config.api_keys.len(),
        "Starting wacli REST API server"
    );

    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
