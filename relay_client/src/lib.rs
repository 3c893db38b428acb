//! # Relay Client Transports
//!
//! Two interchangeable ways for a chat front end to take part in a
//! conversation:
//!
//! - [`SocketClient`] talks to a `relay_server` over TCP.
//! - [`ShmClient`] joins a shared-memory channel on the local host.
//!
//! Both implement [`Transport`] and report through the same
//! [`TransportEvent`] stream, so the front end does not care which one it
//! drives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_client::{ClientConfig, SocketClient, Transport, event_sink};
//!
//! # fn main() -> Result<(), relay_client::TransportError> {
//! let sink = event_sink(|event| println!("{event}"));
//! let mut client = SocketClient::new(ClientConfig::default(), sink);
//! client.connect("127.0.0.1:5000", "alice")?;
//! client.send("hello")?;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod shm;
pub mod socket;
pub mod transport;

pub use config::ClientConfig;
pub use error::{TransportError, TransportResult};
pub use shm::ShmClient;
pub use socket::SocketClient;
pub use transport::{EventSink, Transport, TransportEvent, event_sink};
