//! Broadcast server configuration.

use crate::error::{ServerError, ServerResult};
use relay_common::config::{ConfigError, SharedConfig};
use relay_common::consts::{DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Service name used when no configuration file is given.
pub const SERVER_SERVICE_NAME: &str = "relay_server";

/// Server configuration.
///
/// # TOML Example
///
/// ```toml
/// host = "127.0.0.1"
/// port = 5000
/// handshake_timeout_ms = 10000
/// write_timeout_ms = 5000
///
/// [shared]
/// log_level = "debug"
/// service_name = "relay-server-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Common fields.
    pub shared: SharedConfig,

    /// Listen address (IPv4 or IPv6 literal).
    pub host: String,

    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,

    /// How long a new connection may take to send its handshake.
    /// `None` waits forever.
    pub handshake_timeout_ms: Option<u64>,

    /// Send timeout applied to every session socket. `0` disables it.
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::named(SERVER_SERVICE_NAME),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            handshake_timeout_ms: None,
            write_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Config listening on `host:port` with everything else defaulted.
    pub fn listen_on(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Resolve `host` and `port` into a socket address.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidAddress` if `host` is not an IP literal.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ServerError::InvalidAddress {
                host: self.host.clone(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Handshake timeout, if any.
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }

    /// Session write timeout, if any.
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an unparsable host, a zero
    /// handshake timeout or an invalid shared section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.socket_addr()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if self.handshake_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "handshake_timeout_ms must be greater than 0 (omit it to wait forever)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
