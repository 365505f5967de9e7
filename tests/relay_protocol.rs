// Copyright 2026 XLAN relay developers.
// This file is part of xlan-relay.

// xlan-relay is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// xlan-relay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with xlan-relay.  If not, see <http://www.gnu.org/licenses/>.

//! End-to-end loopback scenarios for the handshake, ping accounting, and
//! operator enforcement: happy-path handshake, a version mismatch, a
//! ping round trip, and a denied operator action.

use std::io::{Read, Write};
use std::net::TcpStream as StdTcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use xlan_relay::{ClientConfig, DisconnectReason, NullCallbacks, RelayConfig, Server};

/// Ticks `f` until it returns `true` or `timeout` elapses, sleeping a
/// short interval between attempts so the loopback handshake has time to
/// complete without the test busy-spinning a CPU core.
fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if f() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn loopback_relay_config() -> RelayConfig {
    RelayConfig {
        bind_tcp: "127.0.0.1:0".to_string(),
        bind_udp: "127.0.0.1:0".to_string(),
        ..RelayConfig::default()
    }
}

#[derive(Default, Clone)]
struct RecordedEvents {
    connections: Vec<(u64, String)>,
    disconnections: Vec<(u64, DisconnectReason)>,
}

#[derive(Clone)]
struct RecordingCallbacks {
    events: Arc<Mutex<RecordedEvents>>,
}

impl RecordingCallbacks {
    fn new() -> Self {
        RecordingCallbacks { events: Arc::new(Mutex::new(RecordedEvents::default())) }
    }
}

impl xlan_relay::Callbacks for RecordingCallbacks {
    fn connection(&mut self, peer_id: u64, name: &str, allow: &mut bool) {
        let _ = allow;
        self.events.lock().unwrap().connections.push((peer_id, name.to_string()));
    }

    fn disconnection(&mut self, peer_id: u64, reason: DisconnectReason) {
        self.events.lock().unwrap().disconnections.push((peer_id, reason));
    }
}

#[test]
fn handshake_happy_path() {
    let callbacks = RecordingCallbacks::new();
    let events = callbacks.events.clone();
    let mut host = Server::host(loopback_relay_config(), xlan_relay::auth::DEFAULT_SALT, callbacks).unwrap();
    let tcp_addr = host.local_tcp_addr().unwrap();
    let udp_addr = host.local_udp_addr().unwrap();

    let mut client = Server::connect(
        ClientConfig {
            connect_tcp: tcp_addr.to_string(),
            connect_udp: udp_addr.to_string(),
            requested_name: Some("alice".to_string()),
            password: None,
        },
        NullCallbacks,
    )
    .unwrap();

    let connected = wait_until(Duration::from_secs(5), || {
        host.tick().unwrap();
        client.tick().unwrap();
        client.own_peer_id().is_some()
    });
    assert!(connected, "client never completed the handshake");

    assert_eq!(host.peers().len(), 1);
    assert_eq!(host.peers()[0].name(), "alice");
    assert_eq!(client.own_peer_id(), Some(host.peers()[0].peer_id));
    assert_eq!(events.lock().unwrap().connections, vec![(host.peers()[0].peer_id, "alice".to_string())]);
}

#[test]
fn version_mismatch_is_refused_and_closed() {
    let mut host = Server::host(loopback_relay_config(), xlan_relay::auth::DEFAULT_SALT, NullCallbacks).unwrap();
    let tcp_addr = host.local_tcp_addr().unwrap();

    let mut raw = StdTcpStream::connect(tcp_addr.std()).unwrap();
    raw.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    // Handshake{protocol_version: 0}, older than PROTOCOL_VERSION (1).
    raw.write_all(&[0xFE, 0xFF, 0x00, 0x00, 0x00, 0x00]).unwrap();

    let mut response = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while response.len() < 6 && Instant::now() < deadline {
        host.tick().unwrap();
        let mut buf = [0u8; 64];
        match raw.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }

    assert_eq!(&response[..2], &[0xFF, 0xFF], "expected a ConnectionRefused tag");
    assert_eq!(&response[2..6], &[0, 0, 0, 0], "reason 0 = version too old");
    assert!(host.peers().is_empty(), "refused peer should never join the roster");
}

#[test]
fn ping_round_trip_updates_latency() {
    let config = RelayConfig { ping_interval_ms: 20, ..loopback_relay_config() };
    let mut host = Server::host(config, xlan_relay::auth::DEFAULT_SALT, NullCallbacks).unwrap();
    let tcp_addr = host.local_tcp_addr().unwrap();
    let udp_addr = host.local_udp_addr().unwrap();

    let mut client = Server::connect(
        ClientConfig {
            connect_tcp: tcp_addr.to_string(),
            connect_udp: udp_addr.to_string(),
            requested_name: Some("bob".to_string()),
            password: None,
        },
        NullCallbacks,
    )
    .unwrap();

    wait_until(Duration::from_secs(5), || {
        host.tick().unwrap();
        client.tick().unwrap();
        client.own_peer_id().is_some()
    });

    let pinged = wait_until(Duration::from_secs(5), || {
        host.tick().unwrap();
        client.tick().unwrap();
        host.peers().first().and_then(|p| p.ping_ms()).is_some()
    });
    assert!(pinged, "host never recorded a ping sample for the client");
    assert!(host.peers()[0].ping_count() >= 1);
}

#[test]
fn operator_action_without_authorization_is_denied_and_leaves_target_connected() {
    let mut host = Server::host(loopback_relay_config(), xlan_relay::auth::DEFAULT_SALT, NullCallbacks).unwrap();
    let tcp_addr = host.local_tcp_addr().unwrap();
    let udp_addr = host.local_udp_addr().unwrap();

    let mut alice = Server::connect(
        ClientConfig {
            connect_tcp: tcp_addr.to_string(),
            connect_udp: udp_addr.to_string(),
            requested_name: Some("alice".to_string()),
            password: None,
        },
        NullCallbacks,
    )
    .unwrap();
    let mut bob = Server::connect(
        ClientConfig {
            connect_tcp: tcp_addr.to_string(),
            connect_udp: udp_addr.to_string(),
            requested_name: Some("bob".to_string()),
            password: None,
        },
        NullCallbacks,
    )
    .unwrap();

    wait_until(Duration::from_secs(5), || {
        host.tick().unwrap();
        alice.tick().unwrap();
        bob.tick().unwrap();
        alice.own_peer_id().is_some() && bob.own_peer_id().is_some()
    });

    let alice_id = host.peers().iter().find(|p| p.name() == "alice").unwrap().peer_id;
    let bob_id = host.peers().iter().find(|p| p.name() == "bob").unwrap().peer_id;

    let result = host.drop_peer(bob_id, alice_id, None);
    assert!(result.is_err(), "a non-operator's drop request must be refused");

    host.tick().unwrap();
    assert!(
        host.peers().iter().any(|p| p.peer_id == alice_id),
        "alice must remain connected after the denied drop"
    );
}
