//! Error types for shared-memory channel operations

use thiserror::Error;

/// Errors that can occur while joining or using a channel
#[derive(Error, Debug)]
pub enum ShmError {
    /// Channel name cannot be used as a POSIX object name
    #[error("Invalid channel name: {name:?}")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Identity (display name) is empty
    #[error("Channel identity cannot be empty")]
    EmptyIdentity,

    /// Message would not pass record validation (empty text)
    #[error("Message text cannot be empty")]
    EmptyMessage,

    /// Existing backing object has a different size than this build expects
    #[error("Channel {name} has incompatible layout: expected {expected} bytes, found {found}")]
    LayoutMismatch {
        /// Channel name
        name: String,
        /// Size this build expects
        expected: usize,
        /// Size of the existing object
        found: usize,
    },

    /// Channel settings are invalid
    #[error("Invalid channel configuration: {source}")]
    Config {
        /// Source validation error
        #[from]
        source: relay_common::config::ConfigError,
    },

    /// Named semaphore could not be opened or operated on
    #[error("Semaphore {name} failed: {source}")]
    Semaphore {
        /// Semaphore name
        name: String,
        /// Source OS error
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for channel operations
pub type ShmResult<T> = Result<T, ShmError>;
