//! Error types for client transports

use relay_common::codec::CodecError;
use relay_shm::ShmError;
use thiserror::Error;

/// Errors returned by [`Transport`](crate::Transport) operations
#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint could not be parsed or resolved
    #[error("Invalid endpoint: {endpoint:?}")]
    InvalidEndpoint {
        /// Endpoint as given
        endpoint: String,
    },

    /// Display name is empty or whitespace
    #[error("Display name cannot be empty")]
    EmptyName,

    /// Message text is empty
    #[error("Message text cannot be empty")]
    EmptyMessage,

    /// `connect` called on a connected transport
    #[error("Already connected")]
    AlreadyConnected,

    /// Operation requires a connection
    #[error("Not connected")]
    NotConnected,

    /// TCP connect failed
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint as given
        endpoint: String,
        /// Source IO error
        source: std::io::Error,
    },

    /// Record could not be sent
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Shared-memory channel error
    #[error("Channel error: {0}")]
    Shm(#[from] ShmError),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
