//! Both transports driven through the same `Transport` interface.

use relay_client::{
    ClientConfig, EventSink, ShmClient, SocketClient, Transport, TransportError, TransportEvent,
    event_sink,
};
use relay_server::{BroadcastServer, ServerConfig};
use relay_shm::{ChannelConfig, ShmChannel};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(300);

fn recorder() -> (EventSink, Receiver<TransportEvent>) {
    let (tx, rx) = mpsc::channel();
    let sink = event_sink(move |event| {
        let _ = tx.send(event);
    });
    (sink, rx)
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        channel: ChannelConfig {
            poll_interval_ms: 10,
        },
        ..ClientConfig::default()
    }
}

fn expect(rx: &Receiver<TransportEvent>, expected: TransportEvent) {
    assert_eq!(rx.recv_timeout(WAIT).expect("event"), expected);
}

fn expect_message(rx: &Receiver<TransportEvent>, sender: &str, text: &str) {
    match rx.recv_timeout(WAIT).expect("message event") {
        TransportEvent::Message {
            sender: got_sender,
            timestamp,
            text: got_text,
        } => {
            assert_eq!(got_sender, sender);
            assert_eq!(got_text, text);
            assert_eq!(timestamp.len(), 20);
        }
        other => panic!("expected message, got {other:?}"),
    }
}

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(10));
    }
}

/// The same conversation, whatever the transport.
fn converse(
    alice: &mut dyn Transport,
    alice_rx: &Receiver<TransportEvent>,
    bob: &mut dyn Transport,
    bob_rx: &Receiver<TransportEvent>,
    ready: impl Fn() -> bool,
    endpoint: &str,
) {
    alice.connect(endpoint, "alice").unwrap();
    bob.connect(endpoint, "bob").unwrap();
    expect(alice_rx, TransportEvent::Connected);
    expect(bob_rx, TransportEvent::Connected);
    wait_until(ready);

    alice.send("hi bob").unwrap();
    expect_message(bob_rx, "alice", "hi bob");

    bob.send("hi alice").unwrap();
    expect_message(alice_rx, "bob", "hi alice");

    assert!(alice_rx.recv_timeout(QUIET).is_err());
    assert!(bob_rx.recv_timeout(QUIET).is_err());

    alice.disconnect();
    expect(alice_rx, TransportEvent::Disconnected);
    assert!(!alice.is_connected());
    assert!(matches!(alice.send("late"), Err(TransportError::NotConnected)));

    bob.disconnect();
    expect(bob_rx, TransportEvent::Disconnected);
}

#[test]
fn socket_transport_conversation() {
    let server = BroadcastServer::new(ServerConfig::listen_on("127.0.0.1", 0));
    let addr = server.start().unwrap();

    let (alice_sink, alice_rx) = recorder();
    let (bob_sink, bob_rx) = recorder();
    let mut alice = SocketClient::new(fast_config(), alice_sink);
    let mut bob = SocketClient::new(fast_config(), bob_sink);

    converse(
        &mut alice,
        &alice_rx,
        &mut bob,
        &bob_rx,
        || server.active_sessions() == 2,
        &addr.to_string(),
    );

    server.stop();
}

#[test]
fn shm_transport_conversation() {
    let channel = format!("relay_client_it_{}", std::process::id());

    let (alice_sink, alice_rx) = recorder();
    let (bob_sink, bob_rx) = recorder();
    let mut alice = ShmClient::new(fast_config(), alice_sink);
    let mut bob = ShmClient::new(fast_config(), bob_sink);

    converse(&mut alice, &alice_rx, &mut bob, &bob_rx, || true, &channel);

    ShmChannel::unlink(&channel).unwrap();
}

#[test]
fn second_connect_is_rejected() {
    let server = BroadcastServer::new(ServerConfig::listen_on("127.0.0.1", 0));
    let addr = server.start().unwrap().to_string();

    let (sink, rx) = recorder();
    let mut client = SocketClient::new(fast_config(), sink);
    client.connect(&addr, "alice").unwrap();
    expect(&rx, TransportEvent::Connected);

    assert!(matches!(
        client.connect(&addr, "alice"),
        Err(TransportError::AlreadyConnected)
    ));
    expect(&rx, TransportEvent::Error("Already connected".to_string()));
    assert!(client.is_connected());

    client.disconnect();
    server.stop();
}

#[test]
fn refused_connection_reports_error() {
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let (sink, rx) = recorder();
    let mut client = SocketClient::new(fast_config(), sink);
    let result = client.connect(&format!("127.0.0.1:{port}"), "alice");
    assert!(matches!(result, Err(TransportError::Connect { .. })));
    assert!(matches!(rx.recv_timeout(WAIT), Ok(TransportEvent::Error(_))));
    assert!(!client.is_connected());
}

#[test]
fn invalid_endpoint_is_a_configuration_error() {
    let (sink, rx) = recorder();
    let mut client = SocketClient::new(fast_config(), sink);
    assert!(matches!(
        client.connect("nonsense", "alice"),
        Err(TransportError::InvalidEndpoint { .. })
    ));
    assert!(matches!(rx.recv_timeout(WAIT), Ok(TransportEvent::Error(_))));
}

#[test]
fn server_stop_emits_one_disconnect() {
    let server = BroadcastServer::new(ServerConfig::listen_on("127.0.0.1", 0));
    let addr = server.start().unwrap().to_string();

    let (sink, rx) = recorder();
    let mut client = SocketClient::new(fast_config(), sink);
    client.connect(&addr, "alice").unwrap();
    expect(&rx, TransportEvent::Connected);
    wait_until(|| server.active_sessions() == 1);

    server.stop();
    expect(&rx, TransportEvent::Disconnected);
    wait_until(|| !client.is_connected());

    client.disconnect();
    assert!(rx.recv_timeout(QUIET).is_err());

    // reconnect after the server comes back
    let addr = server.start().unwrap().to_string();
    client.connect(&addr, "alice").unwrap();
    expect(&rx, TransportEvent::Connected);
    client.disconnect();
    expect(&rx, TransportEvent::Disconnected);
    server.stop();
}

#[test]
fn shm_rejects_blank_name_and_bad_channel() {
    let (sink, rx) = recorder();
    let mut client = ShmClient::new(fast_config(), sink);

    assert!(matches!(
        client.connect("lobby", " "),
        Err(TransportError::EmptyName)
    ));
    assert!(matches!(rx.recv_timeout(WAIT), Ok(TransportEvent::Error(_))));

    assert!(matches!(
        client.connect("bad/name", "alice"),
        Err(TransportError::Shm(_))
    ));
    assert!(matches!(rx.recv_timeout(WAIT), Ok(TransportEvent::Error(_))));
    assert!(!client.is_connected());
    assert!(matches!(client.send("x"), Err(TransportError::NotConnected)));
}
