//! System-wide constants for the relay workspace.
//!
//! Single source of truth for the record layout and default endpoints.
//! Both transports depend on these values being identical on every peer.

use std::time::Duration;

/// Size of the `sender` field in bytes, terminator included.
pub const SENDER_LEN: usize = 32;

/// Size of the `timestamp` field in bytes, terminator included.
pub const TIMESTAMP_LEN: usize = 32;

/// Size of the `body` field in bytes, terminator included.
pub const BODY_LEN: usize = 512;

/// Total size of one encoded record. The record size is the framing.
pub const MESSAGE_SIZE: usize = SENDER_LEN + TIMESTAMP_LEN + BODY_LEN;

/// Longest display name that fits the `sender` field.
pub const MAX_SENDER_BYTES: usize = SENDER_LEN - 1;

/// Longest text that fits the `body` field.
pub const MAX_BODY_BYTES: usize = BODY_LEN - 1;

/// `strftime` pattern for record timestamps (ISO-8601, UTC, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Number of slots in a shared-memory channel ring.
pub const CHANNEL_CAPACITY: usize = 64;

/// Default interval between two scans of a shared-memory channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bind address of the broadcast server.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default TCP port of the broadcast server.
pub const DEFAULT_PORT: u16 = 5000;

/// How long the accept loop waits for a connection before re-checking its stop flag.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_576_bytes() {
        assert_eq!(MESSAGE_SIZE, 576);
    }

    #[test]
    fn payload_limits_leave_room_for_terminator() {
        assert_eq!(MAX_SENDER_BYTES, 31);
        assert_eq!(MAX_BODY_BYTES, 511);
    }

    #[test]
    fn timestamp_pattern_fits_field() {
        // "2025-12-18T12:00:00Z" is 20 bytes
        assert!(20 < TIMESTAMP_LEN);
    }

    #[test]
    fn channel_capacity_is_nonzero() {
        assert!(CHANNEL_CAPACITY > 0);
    }
}
