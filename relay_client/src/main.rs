//! # Relay Chat
//!
//! Line-oriented terminal chat over either transport. Every stdin line is
//! sent as a message; incoming messages and connection events are printed
//! to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Through a broadcast server
//! relay_chat socket --server 127.0.0.1:5000 --name alice
//!
//! # Through a shared-memory channel on this host
//! relay_chat shm --channel lobby --name bob
//!
//! # Remove a channel's shared objects
//! relay_chat unlink --channel lobby
//! ```
//!
//! Type `/quit` (or close stdin) to leave.

#![deny(warnings)]

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use relay_client::{ClientConfig, ShmClient, SocketClient, Transport, event_sink};
use relay_common::config::{ConfigLoader, LogLevel};
use relay_common::init_tracing;
use relay_shm::ShmChannel;
use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Relay Chat - terminal client for socket and shared-memory chat
#[derive(Parser, Debug)]
#[command(name = "relay_chat")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Terminal chat client for the relay server and shared-memory channels")]
#[command(long_about = None)]
struct Args {
    /// Path to client configuration TOML.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat through a broadcast server.
    Socket {
        /// Server address (host:port).
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        server: String,

        /// Display name.
        #[arg(short, long)]
        name: String,
    },

    /// Chat through a shared-memory channel.
    Shm {
        /// Channel name.
        #[arg(short = 'C', long)]
        channel: String,

        /// Display name.
        #[arg(short, long)]
        name: String,
    },

    /// Remove a shared-memory channel.
    Unlink {
        /// Channel name.
        #[arg(short = 'C', long)]
        channel: String,
    },
}

const QUIT: &str = "/quit";

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Warn, args.json);
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

    if let Err(e) = run(args.command, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig {
            shared: relay_common::config::SharedConfig {
                log_level: LogLevel::Warn,
                ..ClientConfig::default().shared
            },
            ..ClientConfig::default()
        },
    };
    config.validate()?;
    Ok(config)
}

fn run(command: Command, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sink = event_sink(|event| println!("{event}"));

    let (transport, endpoint, name) = match command {
        Command::Socket { server, name } => (
            Box::new(SocketClient::new(config, sink)) as Box<dyn Transport>,
            server,
            name,
        ),
        Command::Shm { channel, name } => (
            Box::new(ShmClient::new(config, sink)) as Box<dyn Transport>,
            channel,
            name,
        ),
        Command::Unlink { channel } => {
            ShmChannel::unlink(&channel)?;
            info!(channel = %channel, "Channel removed");
            return Ok(());
        }
    };

    let transport = Arc::new(Mutex::new(transport));
    transport.lock().connect(&endpoint, &name)?;

    let handle = Arc::clone(&transport);
    ctrlc::set_handler(move || {
        handle.lock().disconnect();
        process::exit(0);
    })?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let text = line.trim_end();
        if text == QUIT {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let guard = transport.lock();
        if !guard.is_connected() {
            warn!("Connection lost");
            break;
        }
        if let Err(e) = guard.send(text) {
            warn!(error = %e, "Send failed");
        }
    }

    transport.lock().disconnect();
    Ok(())
}
