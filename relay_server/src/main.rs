//! # Relay Broadcast Server
//!
//! Accepts TCP chat clients and relays every message to all other clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:5000
//! relay_server
//!
//! # Explicit address, verbose logging
//! relay_server --host 127.0.0.1 --port 6000 -v
//!
//! # From a config file
//! relay_server --config /etc/relay/server.toml --json
//! ```

#![deny(warnings)]

use clap::Parser;
use relay_common::config::{ConfigLoader, LogLevel};
use relay_common::init_tracing;
use relay_server::{BroadcastServer, ServerConfig};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Relay broadcast server - thread-per-connection TCP chat relay
#[derive(Parser, Debug)]
#[command(name = "relay_server")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Thread-per-connection TCP broadcast chat server")]
#[command(long_about = None)]
struct Args {
    /// Path to server configuration TOML.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Info, args.json);
            error!("FATAL: {e}");
            process::exit(1);
        }
    };

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.shared.log_level
    };
    init_tracing(level, args.json);

    info!("Relay server v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Relay server shutdown complete");
}

fn load_config(args: &Args) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;
    Ok(config)
}

fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(BroadcastServer::new(config));
    let addr = server.start()?;
    info!("Listening on {addr}. Press Ctrl+C to stop.");

    let handle = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handle.stop();
    })?;

    server.wait();
    Ok(())
}
