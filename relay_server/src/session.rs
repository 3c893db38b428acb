//! Per-connection handler.
//!
//! ```text
//! ACCEPTED ──► AWAITING_IDENTIFY ──► ACTIVE ──► CLOSED
//!                     │                            ▲
//!                     └────────────────────────────┘
//!              (read failure, bad record, blank name)
//! ```
//!
//! The first record's body is the display name. Every later record is
//! re-stamped with that name and the server's clock, then relayed to every
//! other identified session.

use crate::registry::{SessionId, SessionRegistry};
use relay_common::codec::{CodecError, read_message, read_message_timeout};
use relay_common::text::{DisplayName, display_name};
use std::fmt;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, placeholder registered.
    Accepted,
    /// Waiting for the handshake record.
    AwaitingIdentify,
    /// Relaying messages.
    Active,
    /// Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Accepted => "accepted",
            SessionState::AwaitingIdentify => "awaiting_identify",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
enum HandshakeError {
    #[error("handshake not received: {0}")]
    Read(#[from] CodecError),

    #[error("blank display name")]
    BlankName,

    #[error("server is shutting down")]
    Closing,
}

/// One accepted connection and everything its handler needs.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    stream: TcpStream,
    registry: Arc<SessionRegistry>,
    handshake_timeout: Option<Duration>,
    state: SessionState,
    name: Option<DisplayName>,
}

impl Session {
    /// Wrap an accepted connection. The caller has already registered a
    /// placeholder for `id`.
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        stream: TcpStream,
        registry: Arc<SessionRegistry>,
        handshake_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            registry,
            handshake_timeout,
            state: SessionState::Accepted,
            name: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the connection to `Closed`. Blocks until the peer goes away or
    /// the registry shuts the socket down.
    pub fn run(mut self) {
        let span = info_span!("session", id = self.id, peer = %self.peer);
        let _enter = span.enter();

        self.transition(SessionState::AwaitingIdentify);
        match self.identify() {
            Ok(name) => {
                info!(name = %name, "Session active");
                self.name = Some(name);
                self.transition(SessionState::Active);
                self.relay();
            }
            Err(e) => warn!(error = %e, "Handshake failed; closing connection"),
        }
        self.close();
    }

    fn identify(&mut self) -> Result<DisplayName, HandshakeError> {
        let handshake = read_message_timeout(&mut self.stream, self.handshake_timeout)?;
        let raw = handshake.body.as_str();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HandshakeError::BlankName);
        }

        let name = display_name(trimmed);
        if !self.registry.identify(self.id, name.clone()) {
            return Err(HandshakeError::Closing);
        }
        Ok(name)
    }

    fn relay(&mut self) {
        let Some(name) = self.name.clone() else {
            return;
        };

        loop {
            match read_message(&mut self.stream) {
                Ok(mut msg) => {
                    msg.restamp(&name);
                    let delivered = self.registry.broadcast(self.id, &msg);
                    debug!(delivered, bytes = msg.body.len(), "Relayed message");
                }
                Err(e) if e.is_disconnect() => {
                    info!(name = %name, "Peer disconnected");
                    break;
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "Dropping session");
                    break;
                }
            }
        }
    }

    fn close(&mut self) {
        self.transition(SessionState::Closed);
        self.registry.remove(self.id);
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session state");
        self.state = next;
    }
}
