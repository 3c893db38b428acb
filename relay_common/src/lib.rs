//! Relay Common Library
//!
//! This crate provides the message record, the stream codec and the
//! configuration loading utilities shared by every relay crate.
//!
//! # Module Structure
//!
//! - [`message`] - Fixed-size `Message` record (the wire format)
//! - [`text`] - Bounded, NUL-terminated text fields
//! - [`codec`] - Reading and writing whole records over byte streams
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Layout sizes and default endpoints
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use relay_common::message::Message;
//! use relay_common::codec::{read_message, write_message};
//!
//! let msg = Message::new("alice", "hello");
//! let mut wire = Vec::new();
//! write_message(&mut wire, &msg).unwrap();
//! assert_eq!(wire.len(), relay_common::consts::MESSAGE_SIZE);
//!
//! let decoded = read_message(&mut wire.as_slice()).unwrap();
//! assert_eq!(decoded, msg);
//! ```

pub mod codec;
pub mod config;
pub mod consts;
pub mod message;
pub mod prelude;
pub mod text;

use config::LogLevel;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` directives are honoured on top of `level`. With `json` set the
/// output is one JSON object per line. Calling this twice is harmless: the
/// second installation attempt is ignored.
pub fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::from_default_env().add_directive(level.as_tracing_level().into());

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .try_init();
    }
}
