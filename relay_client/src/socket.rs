//! TCP transport to a broadcast server.

use crate::config::ClientConfig;
use crate::error::{TransportError, TransportResult};
use crate::transport::{EventSink, Transport, TransportEvent};
use parking_lot::Mutex;
use relay_common::codec::{read_message, write_message};
use relay_common::message::Message;
use relay_common::text::{DisplayName, display_name};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Client side of the socket protocol.
///
/// `connect` sends the handshake (display name in both `sender` and `body`);
/// a receive thread then turns every incoming record into a
/// [`TransportEvent::Message`].
pub struct SocketClient {
    config: ClientConfig,
    sink: EventSink,
    name: DisplayName,
    writer: Mutex<Option<TcpStream>>,
    receiver: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl SocketClient {
    /// Disconnected client reporting to `sink`.
    pub fn new(config: ClientConfig, sink: EventSink) -> Self {
        Self {
            config,
            sink,
            name: DisplayName::new(),
            writer: Mutex::new(None),
            receiver: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Display name of the current or last connection.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    fn fail(&self, err: TransportError) -> TransportError {
        (self.sink)(TransportEvent::Error(err.to_string()));
        err
    }

    fn open(&self, endpoint: &str, name: &str) -> TransportResult<TcpStream> {
        let addr = resolve(endpoint)?;
        let mut stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout())
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        write_message(&mut stream, &Message::new(name, name))?;
        Ok(stream)
    }

    /// Join a receive thread left over from a connection the peer closed.
    fn reap(&mut self) {
        if let Some(receiver) = self.receiver.take()
            && receiver.thread().id() != thread::current().id()
            && receiver.join().is_err()
        {
            warn!("Receive thread panicked");
        }
        *self.writer.lock() = None;
    }
}

impl Transport for SocketClient {
    fn connect(&mut self, endpoint: &str, requested: &str) -> TransportResult<()> {
        if self.is_connected() {
            return Err(self.fail(TransportError::AlreadyConnected));
        }
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            return Err(self.fail(TransportError::EmptyName));
        }
        self.reap();

        let name = display_name(trimmed);
        let stream = match self.open(endpoint, &name) {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e)),
        };
        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => return Err(self.fail(TransportError::Codec(e.into()))),
        };

        self.name = name;
        *self.writer.lock() = Some(stream);
        self.connected.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new().name("relay-recv".to_string()).spawn({
            let sink = Arc::clone(&self.sink);
            let connected = Arc::clone(&self.connected);
            move || receive_loop(reader, sink, connected)
        });
        match spawned {
            Ok(handle) => self.receiver = Some(handle),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                *self.writer.lock() = None;
                return Err(self.fail(TransportError::Codec(e.into())));
            }
        }

        info!(endpoint, name = %self.name, "Connected to server");
        (self.sink)(TransportEvent::Connected);
        Ok(())
    }

    fn send(&self, text: &str) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if text.is_empty() {
            return Err(TransportError::EmptyMessage);
        }

        let msg = Message::new(&self.name, text);
        let mut writer = self.writer.lock();
        let stream = writer.as_mut().ok_or(TransportError::NotConnected)?;
        write_message(stream, &msg)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        if let Some(stream) = self.writer.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.reap();

        if was_connected {
            info!(name = %self.name, "Disconnected from server");
            (self.sink)(TransportEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_loop(mut stream: TcpStream, sink: EventSink, connected: Arc<AtomicBool>) {
    loop {
        match read_message(&mut stream) {
            Ok(msg) => sink(TransportEvent::from(&msg)),
            Err(e) => {
                debug!(error = %e, "Receive loop ended");
                break;
            }
        }
    }

    // a local disconnect has already cleared the flag and reports itself
    if connected.swap(false, Ordering::SeqCst) {
        info!("Server closed the connection");
        sink(TransportEvent::Disconnected);
    }
}

/// Resolve `host:port` to the first matching address.
fn resolve(endpoint: &str) -> TransportResult<SocketAddr> {
    let invalid = || TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
    };
    if let Ok(addr) = endpoint.trim().parse::<SocketAddr>() {
        return Ok(addr);
    }
    endpoint
        .trim()
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::event_sink;

    fn recording() -> (EventSink, Arc<Mutex<Vec<TransportEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = event_sink({
            let events = Arc::clone(&events);
            move |e| events.lock().push(e)
        });
        (sink, events)
    }

    #[test]
    fn resolve_accepts_literals_and_rejects_garbage() {
        assert_eq!(
            resolve("127.0.0.1:5000").unwrap(),
            "127.0.0.1:5000".parse().unwrap()
        );
        assert!(resolve("[::1]:5000").unwrap().is_ipv6());
        assert!(matches!(
            resolve("no port here"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            resolve("127.0.0.1:99999"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn blank_name_is_rejected_before_connecting() {
        let (sink, events) = recording();
        let mut client = SocketClient::new(ClientConfig::default(), sink);
        assert!(matches!(
            client.connect("127.0.0.1:1", "  "),
            Err(TransportError::EmptyName)
        ));
        assert!(!client.is_connected());
        assert_eq!(
            events.lock().as_slice(),
            &[TransportEvent::Error("Display name cannot be empty".to_string())]
        );
    }

    #[test]
    fn send_requires_connection() {
        let (sink, _) = recording();
        let client = SocketClient::new(ClientConfig::default(), sink);
        assert!(matches!(client.send("hi"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn disconnect_when_idle_emits_nothing() {
        let (sink, events) = recording();
        let mut client = SocketClient::new(ClientConfig::default(), sink);
        client.disconnect();
        drop(client);
        assert!(events.lock().is_empty());
    }
}
