//! Broadcast server lifecycle.
//!
//! `STOPPED ──start──► LISTENING ──stop──► STOPPED`
//!
//! While listening, an accept thread polls the listener so it can notice a
//! stop request, hands every connection a fresh id and spawns one handler
//! thread per connection. There is no connection cap.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::{SessionId, SessionRegistry};
use crate::session::Session;
use parking_lot::Mutex;
use relay_common::codec::{CodecError, wait_readable};
use relay_common::consts::ACCEPT_POLL_INTERVAL;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

struct Listening {
    addr: SocketAddr,
    accept: JoinHandle<()>,
}

/// Handle to a broadcast server.
///
/// The handle is shared (`Arc`) with whatever needs to stop the server, such
/// as a signal handler.
pub struct BroadcastServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    state: Mutex<Option<Listening>>,
}

impl BroadcastServer {
    /// Create a stopped server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            running: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
            state: Mutex::new(None),
        }
    }

    /// Bind, listen and start accepting. Returns the bound address, which
    /// differs from the configured one when port `0` was requested.
    ///
    /// # Errors
    ///
    /// `InvalidAddress`, `AddressInUse`, `PermissionDenied` or `Bind` when the
    /// listener cannot be set up; `AlreadyRunning` when already listening.
    pub fn start(&self) -> ServerResult<SocketAddr> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).map_err(|e| ServerError::from_bind(addr, e))?;
        let local = listener.local_addr()?;

        self.registry.reopen();
        self.running.store(true, Ordering::SeqCst);

        let ctx = AcceptContext {
            registry: Arc::clone(&self.registry),
            running: Arc::clone(&self.running),
            next_id: Arc::clone(&self.next_id),
            handshake_timeout: self.config.handshake_timeout(),
            write_timeout: self.config.write_timeout(),
        };
        let accept = thread::Builder::new()
            .name("relay-accept".to_string())
            .spawn(move || ctx.run(listener))
            .inspect_err(|_| self.running.store(false, Ordering::SeqCst))?;

        info!(addr = %local, "Broadcast server listening");
        *state = Some(Listening { addr: local, accept });
        Ok(local)
    }

    /// Stop listening and close every session. Calling it on a stopped
    /// server does nothing.
    pub fn stop(&self) {
        let Some(listening) = self.state.lock().take() else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        if listening.accept.join().is_err() {
            error!("Accept thread panicked");
        }

        let closed = self.registry.close_all();
        info!(addr = %listening.addr, sessions = closed, "Broadcast server stopped");
    }

    /// `true` while listening.
    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().as_ref().map(|l| l.addr)
    }

    /// Sessions that completed their handshake.
    pub fn active_sessions(&self) -> usize {
        self.registry.identified()
    }

    /// All registered sessions, including those still in the handshake.
    pub fn connected_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Block the calling thread until [`stop`](Self::stop) has run.
    pub fn wait(&self) {
        while self.is_running() {
            thread::sleep(ACCEPT_POLL_INTERVAL);
        }
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State the accept thread shares with the server handle.
struct AcceptContext {
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    handshake_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl AcceptContext {
    fn run(self, listener: TcpListener) {
        while self.running.load(Ordering::SeqCst) {
            match wait_readable(&listener, ACCEPT_POLL_INTERVAL) {
                Ok(()) => {}
                Err(CodecError::TimedOut) => continue,
                Err(e) => {
                    warn!(error = %e, "Listener poll failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
            }

            match listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
        debug!("Accept loop stopped");
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let id: SessionId = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = stream.set_write_timeout(self.write_timeout) {
            warn!(session = id, error = %e, "Failed to set write timeout");
        }
        let handle = match stream.try_clone() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(session = id, %peer, error = %e, "Failed to clone session socket");
                return;
            }
        };
        if !self.registry.add(id, handle, None) {
            debug!(session = id, "Server stopping; connection dropped");
            return;
        }

        info!(session = id, %peer, "Client connected");

        let session = Session::new(
            id,
            peer,
            stream,
            Arc::clone(&self.registry),
            self.handshake_timeout,
        );
        match thread::Builder::new()
            .name(format!("relay-session-{id}"))
            .spawn(move || session.run())
        {
            Ok(handler) => self.registry.attach_handler(id, handler),
            Err(e) => {
                warn!(session = id, error = %e, "Failed to spawn session handler");
                self.registry.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ServerConfig {
        ServerConfig::listen_on("127.0.0.1", 0)
    }

    #[test]
    fn start_reports_bound_port() {
        let server = BroadcastServer::new(loopback());
        let addr = server.start().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert!(server.is_running());
        server.stop();
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
    }

    #[test]
    fn second_start_is_rejected() {
        let server = BroadcastServer::new(loopback());
        server.start().unwrap();
        assert!(matches!(server.start(), Err(ServerError::AlreadyRunning)));
    }

    #[test]
    fn stop_is_idempotent() {
        let server = BroadcastServer::new(loopback());
        server.stop();
        server.start().unwrap();
        server.stop();
        server.stop();
    }

    #[test]
    fn invalid_host_fails_before_binding() {
        let server = BroadcastServer::new(ServerConfig::listen_on("localhost-ish", 0));
        assert!(matches!(
            server.start(),
            Err(ServerError::InvalidAddress { .. })
        ));
        assert!(!server.is_running());
    }

    #[test]
    fn occupied_port_is_address_in_use() {
        let first = BroadcastServer::new(loopback());
        let addr = first.start().unwrap();

        let second = BroadcastServer::new(ServerConfig::listen_on("127.0.0.1", addr.port()));
        assert!(matches!(
            second.start(),
            Err(ServerError::AddressInUse { .. })
        ));
    }

    #[test]
    fn wait_returns_after_stop_from_another_thread() {
        let server = Arc::new(BroadcastServer::new(loopback()));
        server.start().unwrap();

        let stopper = thread::spawn({
            let server = Arc::clone(&server);
            move || {
                thread::sleep(Duration::from_millis(50));
                server.stop();
            }
        });
        server.wait();
        stopper.join().unwrap();
        assert!(!server.is_running());
    }
}
