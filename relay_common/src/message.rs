//! The `Message` record.
//!
//! One record is 576 bytes on every transport: the socket codec sends its
//! byte image and the shared-memory channel stores it verbatim in a ring slot.
//!
//! | field     | size | encoding                                  |
//! |-----------|------|-------------------------------------------|
//! | sender    | 32   | NUL-terminated text, zero-padded          |
//! | timestamp | 32   | NUL-terminated ISO-8601 UTC, zero-padded  |
//! | body      | 512  | NUL-terminated text, zero-padded          |
//!
//! There is no length prefix and no version field; both ends must agree on
//! the size out of band.

use crate::consts::{BODY_LEN, MESSAGE_SIZE, SENDER_LEN, TIMESTAMP_FORMAT, TIMESTAMP_LEN};
use crate::text::BoundedText;
use static_assertions::const_assert_eq;

/// Chat record shared by both transports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Message {
    /// Display name of the sender.
    pub sender: BoundedText<SENDER_LEN>,
    /// ISO-8601 UTC time, `YYYY-MM-DDTHH:MM:SSZ`.
    pub timestamp: BoundedText<TIMESTAMP_LEN>,
    /// Message text.
    pub body: BoundedText<BODY_LEN>,
}

const_assert_eq!(core::mem::size_of::<Message>(), MESSAGE_SIZE);
const_assert_eq!(core::mem::align_of::<Message>(), 1);

const TIMESTAMP_OFFSET: usize = SENDER_LEN;
const BODY_OFFSET: usize = SENDER_LEN + TIMESTAMP_LEN;

impl Message {
    /// Record from `sender` and `body`, stamped with the current UTC time.
    pub fn new(sender: &str, body: &str) -> Self {
        Self::with_timestamp(sender, &current_timestamp(), body)
    }

    /// Record with an explicit timestamp.
    pub fn with_timestamp(sender: &str, timestamp: &str, body: &str) -> Self {
        Self {
            sender: BoundedText::from_str_truncated(sender),
            timestamp: BoundedText::from_str_truncated(timestamp),
            body: BoundedText::from_str_truncated(body),
        }
    }

    /// A record is valid when `sender` and `body` are non-empty and both are
    /// terminated within their bound.
    pub fn is_valid(&self) -> bool {
        !self.sender.is_empty()
            && !self.body.is_empty()
            && self.sender.is_terminated()
            && self.body.is_terminated()
    }

    /// Overwrite `sender` and `timestamp` with server-side values.
    ///
    /// The relay never trusts what a client put into these two fields.
    pub fn restamp(&mut self, sender: &str) {
        self.sender.set(sender);
        self.timestamp.set(&current_timestamp());
    }

    /// Byte image of the record.
    pub fn to_bytes(&self) -> [u8; MESSAGE_SIZE] {
        let mut out = [0u8; MESSAGE_SIZE];
        out[..TIMESTAMP_OFFSET].copy_from_slice(self.sender.as_bytes());
        out[TIMESTAMP_OFFSET..BODY_OFFSET].copy_from_slice(self.timestamp.as_bytes());
        out[BODY_OFFSET..].copy_from_slice(self.body.as_bytes());
        out
    }

    /// Rebuild a record from its byte image. Validity is not checked here.
    pub fn from_bytes(bytes: &[u8; MESSAGE_SIZE]) -> Self {
        let mut sender = [0u8; SENDER_LEN];
        let mut timestamp = [0u8; TIMESTAMP_LEN];
        let mut body = [0u8; BODY_LEN];
        sender.copy_from_slice(&bytes[..TIMESTAMP_OFFSET]);
        timestamp.copy_from_slice(&bytes[TIMESTAMP_OFFSET..BODY_OFFSET]);
        body.copy_from_slice(&bytes[BODY_OFFSET..]);
        Self {
            sender: BoundedText::from_bytes(sender),
            timestamp: BoundedText::from_bytes(timestamp),
            body: BoundedText::from_bytes(body),
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("sender", &self.sender)
            .field("timestamp", &self.timestamp)
            .field("body", &self.body)
            .finish()
    }
}

/// Current UTC time formatted as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn current_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{MAX_BODY_BYTES, MAX_SENDER_BYTES};
    use proptest::prelude::*;

    #[test]
    fn record_size_and_alignment() {
        assert_eq!(core::mem::size_of::<Message>(), 576);
        assert_eq!(Message::default().to_bytes().len(), 576);
    }

    #[test]
    fn default_record_is_invalid() {
        assert!(!Message::default().is_valid());
    }

    #[test]
    fn empty_body_is_invalid() {
        let msg = Message::with_timestamp("alice", "2025-12-18T12:00:00Z", "");
        assert!(!msg.is_valid());
    }

    #[test]
    fn empty_sender_is_invalid() {
        let msg = Message::with_timestamp("", "2025-12-18T12:00:00Z", "hello");
        assert!(!msg.is_valid());
    }

    #[test]
    fn unterminated_body_is_invalid() {
        let mut bytes = Message::new("alice", "hi").to_bytes();
        bytes[BODY_OFFSET..].fill(b'x');
        assert!(!Message::from_bytes(&bytes).is_valid());
    }

    #[test]
    fn unterminated_sender_is_invalid() {
        let mut bytes = Message::new("alice", "hi").to_bytes();
        bytes[..TIMESTAMP_OFFSET].fill(b'y');
        assert!(!Message::from_bytes(&bytes).is_valid());
    }

    #[test]
    fn oversized_fields_are_truncated() {
        let msg = Message::new(&"A".repeat(50), &"B".repeat(600));
        assert_eq!(msg.sender.len(), MAX_SENDER_BYTES);
        assert_eq!(msg.body.len(), MAX_BODY_BYTES);
        assert!(msg.is_valid());
    }

    #[test]
    fn field_offsets_match_wire_layout() {
        let msg = Message::with_timestamp("bob", "2025-12-18T12:00:00Z", "hey");
        let bytes = msg.to_bytes();
        assert_eq!(&bytes[..3], b"bob");
        assert_eq!(&bytes[32..52], b"2025-12-18T12:00:00Z");
        assert_eq!(&bytes[64..67], b"hey");
        assert_eq!(bytes[67], 0);
    }

    #[test]
    fn timestamp_has_iso8601_shape() {
        let ts = current_timestamp();
        assert_eq!(ts.len(), 20);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn restamp_replaces_sender_and_timestamp() {
        let mut msg = Message::with_timestamp("mallory", "1970-01-01T00:00:00Z", "hello");
        msg.restamp("alice");
        assert_eq!(msg.sender.as_str(), "alice");
        assert_ne!(msg.timestamp.as_str(), "1970-01-01T00:00:00Z");
        assert_eq!(msg.body.as_str(), "hello");
    }

    proptest! {
        #[test]
        fn byte_image_round_trips(
            sender in "[a-zA-Z0-9_]{1,31}",
            body in r"[^\x00]{1,200}",
        ) {
            let msg = Message::new(&sender, &body);
            let decoded = Message::from_bytes(&msg.to_bytes());
            prop_assert_eq!(decoded, msg);
            prop_assert!(decoded.is_valid());
        }
    }
}
