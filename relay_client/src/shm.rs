//! Shared-memory transport.

use crate::config::ClientConfig;
use crate::error::{TransportError, TransportResult};
use crate::transport::{EventSink, Transport, TransportEvent};
use relay_shm::ShmChannel;
use std::sync::Arc;
use tracing::info;

/// Chat over a shared-memory channel on this host.
///
/// The endpoint is the channel name; the display name is the channel
/// identity, so a participant never receives its own messages.
pub struct ShmClient {
    config: ClientConfig,
    sink: EventSink,
    channel: Option<ShmChannel>,
}

impl ShmClient {
    /// Detached client reporting to `sink`.
    pub fn new(config: ClientConfig, sink: EventSink) -> Self {
        Self {
            config,
            sink,
            channel: None,
        }
    }

    /// Name of the joined channel.
    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_ref().map(ShmChannel::name)
    }

    fn fail(&self, err: TransportError) -> TransportError {
        (self.sink)(TransportEvent::Error(err.to_string()));
        err
    }
}

impl Transport for ShmClient {
    fn connect(&mut self, endpoint: &str, requested: &str) -> TransportResult<()> {
        if self.channel.is_some() {
            return Err(self.fail(TransportError::AlreadyConnected));
        }
        let name = requested.trim();
        if name.is_empty() {
            return Err(self.fail(TransportError::EmptyName));
        }

        let sink = Arc::clone(&self.sink);
        let joined = ShmChannel::join(endpoint, name, &self.config.channel, move |msg| {
            sink(TransportEvent::from(&msg));
        });
        let channel = match joined {
            Ok(channel) => channel,
            Err(e) => return Err(self.fail(e.into())),
        };

        info!(channel = endpoint, name = channel.identity(), "Joined channel");
        self.channel = Some(channel);
        (self.sink)(TransportEvent::Connected);
        Ok(())
    }

    fn send(&self, text: &str) -> TransportResult<()> {
        let channel = self.channel.as_ref().ok_or(TransportError::NotConnected)?;
        if text.is_empty() {
            return Err(TransportError::EmptyMessage);
        }
        channel.send(text)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.leave();
            (self.sink)(TransportEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.channel.is_some()
    }
}

impl Drop for ShmClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
