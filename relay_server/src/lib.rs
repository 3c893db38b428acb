//! # Relay Broadcast Server
//!
//! Thread-per-connection TCP relay. Each client identifies itself with one
//! handshake record; every later record it sends is re-stamped with its
//! display name and the server time and written to all other identified
//! clients.
//!
//! ## Module Structure
//!
//! - [`server`] - `BroadcastServer` lifecycle and accept loop
//! - [`session`] - Per-connection state machine
//! - [`registry`] - Lock-guarded session table and broadcast
//! - [`config`] - `ServerConfig` (TOML)
//! - [`error`] - `ServerError`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_server::{BroadcastServer, ServerConfig};
//!
//! # fn main() -> Result<(), relay_server::ServerError> {
//! let server = BroadcastServer::new(ServerConfig::listen_on("127.0.0.1", 5000));
//! let addr = server.start()?;
//! println!("listening on {addr}");
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use registry::{SessionId, SessionRegistry};
pub use server::BroadcastServer;
pub use session::{Session, SessionState};
