// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! REST server wired to the simulated platform, for UI work and demos

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use wa_logging::CliLoggingArgs;
use wa_rest_server::config::{PairingArgs, parse_api_keys};
use wa_rest_server::mock_dependencies::MockServerDependencies;
use wa_rest_server::platform::SimulationOptions;
use wa_rest_server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "wacli REST API server (simulated platform)")]
struct Args {
    /// Bind address for the server
    #[arg(short, long, default_value = "127.0.0.1:38180")]
    bind: SocketAddr,

    /// Accepted API keys
    #[arg(long, env = "WACLI_API_KEYS", default_value = "dev-key")]
    api_keys: String,

    /// Enable CORS for development
    #[arg(long)]
    cors: bool,

    /// Milliseconds until the first pairing code is issued
    #[arg(long, default_value_t = 500)]
    code_delay_ms: u64,

    /// Seconds after the first code until the simulated user scans it
    #[arg(long)]
    scan_after: Option<u64>,

    /// Start with a paired device
    #[arg(long)]
    paired: bool,

    #[command(flatten)]
    pairing: PairingArgs,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    args.logging.init("wacli-api-mock")?;

    tracing::info!("Starting wacli REST API mock server");

    let config = ServerConfig {
        bind_addr: args.bind,
        api_keys: parse_api_keys(&args.api_keys),
        enable_cors: args.cors,
        pairing: args.pairing.into_config(),
        ..Default::default()
    };

    let options = SimulationOptions {
        code_delay: Duration::from_millis(args.code_delay_ms),
        scan_after: args.scan_after.map(Duration::from_secs),
        logged_in: args.paired,
        ..Default::default()
    };

    let deps = MockServerDependencies::with_options(config.clone(), options).await?;
    let server = Server::with_state(config, deps.into_state()).await?;
    server.run().await?;

    Ok(())
}
