//! Prelude module for common re-exports.
//!
//! ```rust
//! use relay_common::prelude::*;
//! ```

// ─── Record ─────────────────────────────────────────────────────────
pub use crate::message::{Message, current_timestamp};
pub use crate::text::{BoundedText, DisplayName, display_name};

// ─── Codec ──────────────────────────────────────────────────────────
pub use crate::codec::{CodecError, read_message, read_message_timeout, write_message};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL, MESSAGE_SIZE};
