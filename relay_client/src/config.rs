//! Client configuration.

use relay_common::config::{ConfigError, SharedConfig};
use relay_shm::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service name used when no configuration file is given.
pub const CLIENT_SERVICE_NAME: &str = "relay_chat";

/// Settings for both transports.
///
/// # TOML Example
///
/// ```toml
/// connect_timeout_ms = 3000
///
/// [shared]
/// service_name = "relay-chat"
///
/// [channel]
/// poll_interval_ms = 50
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Common fields.
    pub shared: SharedConfig,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Shared-memory channel settings.
    pub channel: ChannelConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::named(CLIENT_SERVICE_NAME),
            connect_timeout_ms: 5000,
            channel: ChannelConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a zero connect timeout or
    /// an invalid nested section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.channel.validate()?;
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
