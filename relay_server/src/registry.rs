//! Session registry.
//!
//! Maps session ids to their socket, display name and handler thread. Every
//! operation takes the same lock, so a broadcast always walks a consistent
//! set of sessions: an `add` or `remove` racing with it completes either
//! before or after the whole pass.
//!
//! Sessions are registered as soon as they are accepted, before the handshake
//! arrives. Such placeholders carry no name and are never broadcast to.

use parking_lot::Mutex;
use relay_common::codec::write_message;
use relay_common::message::Message;
use relay_common::text::DisplayName;
use std::collections::BTreeMap;
use std::net::{Shutdown, TcpStream};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Connection identifier, unique for the lifetime of a server.
pub type SessionId = u64;

struct Entry {
    stream: TcpStream,
    name: Option<DisplayName>,
    handler: Option<JoinHandle<()>>,
}

struct Inner {
    sessions: BTreeMap<SessionId, Entry>,
    accepting: bool,
}

/// Lock-guarded table of live sessions.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Empty registry that accepts new sessions.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: BTreeMap::new(),
                accepting: true,
            }),
        }
    }

    /// Register `id`, or update its name if it is already registered.
    ///
    /// On update the existing socket is kept and `stream` is dropped. Returns
    /// `false` (and shuts `stream` down) once the registry has been closed.
    pub fn add(&self, id: SessionId, stream: TcpStream, name: Option<DisplayName>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.accepting {
            let _ = stream.shutdown(Shutdown::Both);
            return false;
        }

        match inner.sessions.get_mut(&id) {
            Some(entry) => {
                if name.is_some() {
                    entry.name = name;
                }
            }
            None => {
                inner.sessions.insert(
                    id,
                    Entry {
                        stream,
                        name,
                        handler: None,
                    },
                );
            }
        }
        true
    }

    /// Attach a display name to a registered session.
    ///
    /// Returns `false` if `id` is not registered, e.g. because the server is
    /// shutting down.
    pub fn identify(&self, id: SessionId, name: DisplayName) -> bool {
        match self.inner.lock().sessions.get_mut(&id) {
            Some(entry) => {
                entry.name = Some(name);
                true
            }
            None => false,
        }
    }

    /// Store the handler thread of `id` so [`close_all`](Self::close_all) can
    /// join it. A handle for an id that is already gone is detached.
    pub fn attach_handler(&self, id: SessionId, handle: JoinHandle<()>) {
        if let Some(entry) = self.inner.lock().sessions.get_mut(&id) {
            entry.handler = Some(handle);
        }
    }

    /// Unregister `id` and shut its socket down. Absent ids are a no-op.
    ///
    /// Returns `true` if the session was registered.
    pub fn remove(&self, id: SessionId) -> bool {
        let entry = self.inner.lock().sessions.remove(&id);
        match entry {
            Some(entry) => {
                let _ = entry.stream.shutdown(Shutdown::Both);
                debug!(session = id, "Session unregistered");
                true
            }
            None => false,
        }
    }

    /// Call `f` for every identified session other than `except`, holding the
    /// lock for the whole pass.
    pub fn for_each_except<F>(&self, except: SessionId, mut f: F)
    where
        F: FnMut(SessionId, &str, &TcpStream),
    {
        let inner = self.inner.lock();
        for (&id, entry) in &inner.sessions {
            if id == except {
                continue;
            }
            if let Some(name) = &entry.name {
                f(id, name.as_str(), &entry.stream);
            }
        }
    }

    /// Send `msg` to every identified session except `from`.
    ///
    /// A failed send, including a write timeout, shuts the target's socket
    /// down: a partially written record must not leave a live stream out of
    /// frame. The target's handler then sees end of stream and unregisters
    /// it. Returns the number of sessions the record was written to.
    pub fn broadcast(&self, from: SessionId, msg: &Message) -> usize {
        let mut delivered = 0;
        self.for_each_except(from, |id, name, mut stream| {
            match write_message(&mut stream, msg) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(session = id, name, error = %e, "Broadcast send failed; dropping session");
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
        });
        delivered
    }

    /// Number of registered sessions, including unidentified ones.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// `true` if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions that completed their handshake.
    pub fn identified(&self) -> usize {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|entry| entry.name.is_some())
            .count()
    }

    /// Display names of identified sessions, in id order.
    pub fn names(&self) -> Vec<DisplayName> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter_map(|entry| entry.name.clone())
            .collect()
    }

    /// Stop accepting sessions, shut every registered socket down and wait
    /// for the handler threads. Returns the number of sessions closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(SessionId, Entry)> = {
            let mut inner = self.inner.lock();
            inner.accepting = false;
            std::mem::take(&mut inner.sessions).into_iter().collect()
        };

        for (_, entry) in &drained {
            let _ = entry.stream.shutdown(Shutdown::Both);
        }

        let current = thread::current().id();
        let count = drained.len();
        for (id, entry) in drained {
            let Some(handler) = entry.handler else {
                continue;
            };
            if handler.thread().id() == current {
                continue;
            }
            if handler.join().is_err() {
                warn!(session = id, "Session handler panicked");
            }
        }
        count
    }

    /// Accept sessions again after [`close_all`](Self::close_all).
    pub fn reopen(&self) {
        self.inner.lock().accepting = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_common::codec::read_message;
    use relay_common::text::display_name;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Connected (server side, client side) socket pair on loopback.
    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        (server, client)
    }

    #[test]
    fn add_then_update_name() {
        let registry = SessionRegistry::new();
        let (server, _client) = pair();
        let dup = server.try_clone().unwrap();

        assert!(registry.add(1, server, None));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.identified(), 0);

        assert!(registry.add(1, dup, Some(display_name("alice"))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec![display_name("alice")]);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        assert!(!registry.remove(42));

        let (server, _client) = pair();
        registry.add(7, server, Some(display_name("bob")));
        assert!(registry.remove(7));
        assert!(!registry.remove(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_shuts_the_socket_down() {
        let registry = SessionRegistry::new();
        let (server, mut client) = pair();
        registry.add(1, server, None);
        registry.remove(1);
        assert!(read_message(&mut client).is_err());
    }

    #[test]
    fn for_each_except_skips_sender_and_placeholders() {
        let registry = SessionRegistry::new();
        let mut clients = Vec::new();
        for (id, name) in [(1, Some("a")), (2, Some("b")), (3, None), (4, Some("d"))] {
            let (server, client) = pair();
            registry.add(id, server, name.map(display_name));
            clients.push(client);
        }

        let mut seen = Vec::new();
        registry.for_each_except(2, |id, name, _| seen.push((id, name.to_string())));
        assert_eq!(seen, vec![(1, "a".to_string()), (4, "d".to_string())]);
    }

    #[test]
    fn broadcast_reaches_everyone_but_the_sender() {
        let registry = SessionRegistry::new();
        let (s1, mut c1) = pair();
        let (s2, mut c2) = pair();
        let (s3, mut c3) = pair();
        registry.add(1, s1, Some(display_name("one")));
        registry.add(2, s2, Some(display_name("two")));
        registry.add(3, s3, Some(display_name("three")));

        let msg = Message::new("two", "hello");
        assert_eq!(registry.broadcast(2, &msg), 2);

        assert_eq!(read_message(&mut c1).unwrap(), msg);
        assert_eq!(read_message(&mut c3).unwrap(), msg);
        c2.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        assert!(read_message(&mut c2).is_err());
    }

    #[test]
    fn closed_registry_refuses_new_sessions() {
        let registry = SessionRegistry::new();
        let (server, _client) = pair();
        registry.add(1, server, Some(display_name("a")));

        assert_eq!(registry.close_all(), 1);
        assert!(registry.is_empty());

        let (late, _late_client) = pair();
        assert!(!registry.add(2, late, None));
        assert!(registry.is_empty());

        registry.reopen();
        let (again, _again_client) = pair();
        assert!(registry.add(3, again, None));
    }

    #[test]
    fn close_all_joins_handlers() {
        let registry = Arc::new(SessionRegistry::new());
        let (server, _client) = pair();
        let mut reader = server.try_clone().unwrap();
        registry.add(1, server, None);

        let finished = Arc::new(AtomicBool::new(false));
        let handle = std::thread::spawn({
            let registry = Arc::clone(&registry);
            let finished = Arc::clone(&finished);
            move || {
                // unblocked by close_all shutting the socket down
                let _ = read_message(&mut reader);
                registry.remove(1);
                finished.store(true, Ordering::SeqCst);
            }
        });
        registry.attach_handler(1, handle);

        registry.close_all();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrent_mutation_during_broadcast() {
        let registry = Arc::new(SessionRegistry::new());
        let mut clients = Vec::new();
        for id in 0..8 {
            let (server, client) = pair();
            registry.add(id, server, Some(display_name(&format!("s{id}"))));
            clients.push(client);
        }

        let churn = std::thread::spawn({
            let registry = Arc::clone(&registry);
            move || {
                for id in 100..150 {
                    let (server, client) = pair();
                    registry.add(id, server, Some(display_name("churn")));
                    registry.remove(id);
                    drop(client);
                }
            }
        });

        for _ in 0..50 {
            let mut ids = Vec::new();
            registry.for_each_except(0, |id, _, _| ids.push(id));
            let mut deduped = ids.clone();
            deduped.dedup();
            assert_eq!(ids, deduped);
            assert!(ids.iter().all(|id| *id != 0));
        }

        churn.join().unwrap();
        assert_eq!(registry.len(), 8);
    }
}
