//! Transport-agnostic client interface.
//!
//! Both transports expose the same four operations and report everything
//! asynchronous (incoming messages, connection changes, failures) as
//! [`TransportEvent`]s pushed into an [`EventSink`]. Events may arrive on a
//! background thread.

use crate::error::TransportResult;
use relay_common::message::Message;
use std::fmt;
use std::sync::Arc;

/// Notification emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connect (or join) succeeded.
    Connected,
    /// A message from another participant.
    Message {
        /// Sender display name
        sender: String,
        /// ISO-8601 UTC time
        timestamp: String,
        /// Message text
        text: String,
    },
    /// The connection ended, locally or remotely. Emitted once per connection.
    Disconnected,
    /// A failure worth showing to the user.
    Error(String),
}

impl From<&Message> for TransportEvent {
    fn from(msg: &Message) -> Self {
        TransportEvent::Message {
            sender: msg.sender.as_str().into_owned(),
            timestamp: msg.timestamp.as_str().into_owned(),
            text: msg.body.as_str().into_owned(),
        }
    }
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Connected => f.write_str("*** connected"),
            TransportEvent::Message {
                sender,
                timestamp,
                text,
            } => write!(f, "[{timestamp}] {sender}: {text}"),
            TransportEvent::Disconnected => f.write_str("*** disconnected"),
            TransportEvent::Error(e) => write!(f, "*** error: {e}"),
        }
    }
}

/// Receiver of transport events.
pub type EventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Wrap a closure as an [`EventSink`].
pub fn event_sink<F>(f: F) -> EventSink
where
    F: Fn(TransportEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Chat transport.
pub trait Transport: Send {
    /// Connect to `endpoint` as `display_name`.
    ///
    /// Emits `Connected` on success and `Error` on failure.
    fn connect(&mut self, endpoint: &str, display_name: &str) -> TransportResult<()>;

    /// Send `text` as this participant.
    fn send(&self, text: &str) -> TransportResult<()>;

    /// Close the connection. Emits `Disconnected` if one was open.
    fn disconnect(&mut self);

    /// `true` while connected.
    fn is_connected(&self) -> bool;
}
