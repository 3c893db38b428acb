//! Error types for the broadcast server

use std::net::SocketAddr;
use thiserror::Error;

/// Errors returned by [`BroadcastServer::start`](crate::BroadcastServer::start)
#[derive(Error, Debug)]
pub enum ServerError {
    /// Host is not a valid IP address
    #[error("Invalid listen address: {host:?}")]
    InvalidAddress {
        /// Configured host
        host: String,
    },

    /// Another socket is already bound to the address
    #[error("Address already in use: {addr}")]
    AddressInUse {
        /// Requested address
        addr: SocketAddr,
    },

    /// Not allowed to bind the address (privileged port, policy)
    #[error("Permission denied binding {addr}")]
    PermissionDenied {
        /// Requested address
        addr: SocketAddr,
    },

    /// Bind or listen failed for another reason
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Source IO error
        source: std::io::Error,
    },

    /// `start` called while the server is listening
    #[error("Server is already running")]
    AlreadyRunning,

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

impl ServerError {
    /// Classify a bind failure.
    pub fn from_bind(addr: SocketAddr, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::AddrInUse => ServerError::AddressInUse { addr },
            std::io::ErrorKind::PermissionDenied => ServerError::PermissionDenied { addr },
            std::io::ErrorKind::AddrNotAvailable | std::io::ErrorKind::InvalidInput => {
                ServerError::InvalidAddress {
                    host: addr.ip().to_string(),
                }
            }
            _ => ServerError::Bind { addr, source },
        }
    }
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;
