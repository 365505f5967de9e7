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

//! Event loop, membership, and the handshake/authentication state machine.
//!
//! This file holds the core state and the `tick()` skeleton, [`handler`]
//! holds per-frame dispatch, and [`broadcast`] holds the outgoing
//! fan-out helpers.

mod broadcast;
mod handler;

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::auth::PasswordVerifier;
use crate::callbacks::Callbacks;
use crate::config::{ClientConfig, RelayConfig};
use crate::error::{DisconnectReason, Error, ErrorKind, Result};
use crate::net::{TcpListener, TcpStream, UdpSocket};
use crate::peer::{ClientState, Peer, RemotePeerInfo};
use crate::sockaddr::SocketAddress;
use crate::wire::{Frame, PeerId};

/// Reserved identity used when the host itself is the sender/recipient, or
/// when a local (non-peer) caller invokes an operator action directly.
pub const SERVER_PEER_ID: PeerId = PeerId::MAX;

/// The peer session relay: either a host accepting connections, or a
/// client connected to one. One `tick()` call performs one non-blocking
/// pass of the event loop and returns; the caller supplies the loop and
/// whatever pacing it wants between ticks.
pub struct Server<C: Callbacks> {
    is_client: bool,
    server_name: String,
    password_verifier: PasswordVerifier,
    max_peers: usize,
    ping_interval: Duration,
    handshake_timeout: Duration,

    tcp_listener: Option<TcpListener>,
    peers: Vec<Peer>,
    next_peer_id: PeerId,

    host_tcp: Option<TcpStream>,
    client_state: ClientState,
    client_recv_buffer: Vec<u8>,
    own_peer_id: Option<PeerId>,
    requested_name: String,
    client_password: Option<String>,
    remote_peers: Vec<RemotePeerInfo>,

    udp: UdpSocket,
    callbacks: C,
}

impl<C: Callbacks> Server<C> {
    /// Starts a host: binds a TCP listener and a UDP data socket and waits
    /// for peers to connect.
    ///
    /// `salt` seeds the password-verifier derivation; pass
    /// [`crate::auth::DEFAULT_SALT`] unless every client connecting to
    /// this host is configured with the same custom salt out of band.
    pub fn host(config: RelayConfig, salt: [u8; 16], callbacks: C) -> Result<Self> {
        let tcp_addr = SocketAddress::resolve_bind(&config.bind_tcp)?;
        let udp_addr = SocketAddress::resolve_bind(&config.bind_udp)?;
        let tcp_listener = TcpListener::bind(tcp_addr)?;
        let udp = UdpSocket::bind(udp_addr)?;
        info!("hosting xlan relay on {tcp_addr} (tcp) / {udp_addr} (udp)");

        Ok(Server {
            is_client: false,
            server_name: config.server_name,
            password_verifier: PasswordVerifier::new(config.password.as_deref(), salt),
            max_peers: config.max_peers,
            ping_interval: Duration::from_millis(config.ping_interval_ms),
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
            tcp_listener: Some(tcp_listener),
            peers: Vec::new(),
            next_peer_id: 0,
            host_tcp: None,
            client_state: ClientState::Steady,
            client_recv_buffer: Vec::new(),
            own_peer_id: None,
            requested_name: String::new(),
            client_password: None,
            remote_peers: Vec::new(),
            udp,
            callbacks,
        })
    }

    /// Connects to a host as a peer.
    pub fn connect(config: ClientConfig, callbacks: C) -> Result<Self> {
        let tcp_addr = SocketAddress::resolve_bind(&config.connect_tcp)?;
        let udp_addr = SocketAddress::resolve_bind(&config.connect_udp)?;
        let local_udp = SocketAddress::resolve("0.0.0.0", 0)?;
        let tcp = TcpStream::connect(tcp_addr, None)?;
        let udp = UdpSocket::bind(local_udp)?;
        udp.send_to(&[], udp_addr).ok(); // punches the UDP path toward the host, best-effort
        info!("connecting to xlan relay host at {tcp_addr}");

        let name = config.requested_name.unwrap_or_default();
        let mut server = Server {
            is_client: true,
            server_name: String::new(),
            password_verifier: PasswordVerifier::new(None, crate::auth::DEFAULT_SALT),
            max_peers: usize::MAX,
            ping_interval: Duration::from_millis(5_000),
            handshake_timeout: Duration::from_millis(10_000),
            tcp_listener: None,
            peers: Vec::new(),
            next_peer_id: 0,
            host_tcp: Some(tcp),
            client_state: ClientState::SentHandshake,
            client_recv_buffer: Vec::new(),
            own_peer_id: None,
            requested_name: name,
            client_password: config.password,
            remote_peers: Vec::new(),
            udp,
            callbacks,
        };
        server.send_to_host(&Frame::Handshake(crate::wire::Handshake {
            protocol_version: crate::wire::PROTOCOL_VERSION,
        }))?;
        server.client_state = ClientState::AwaitHandshakeResponse;
        Ok(server)
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Connected peers, in wire (insertion) order. Empty on a client.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// The client's mirrored view of the host's peer list. Empty on a host.
    pub fn remote_peers(&self) -> &[RemotePeerInfo] {
        &self.remote_peers
    }

    /// This instance's own peer id, once the handshake has completed
    /// (client only).
    pub fn own_peer_id(&self) -> Option<PeerId> {
        self.own_peer_id
    }

    /// The address actually bound by the host's TCP listener. Useful when
    /// `RelayConfig::bind_tcp` asked for an ephemeral port.
    pub fn local_tcp_addr(&self) -> Result<SocketAddress> {
        self.tcp_listener
            .as_ref()
            .expect("only a host owns a listener")
            .local_addr()
    }

    /// The address actually bound by the host's UDP socket. Useful when
    /// `RelayConfig::bind_udp` asked for an ephemeral port.
    pub fn local_udp_addr(&self) -> Result<SocketAddress> {
        self.udp.local_addr()
    }

    /// One non-blocking pass: accept, read, dispatch, emit pings, reap.
    /// Never blocks; the caller drives the pacing between calls.
    pub fn tick(&mut self) -> Result<()> {
        if self.is_client {
            self.tick_client()
        } else {
            self.tick_host()
        }
    }

    fn tick_host(&mut self) -> Result<()> {
        self.accept_incoming()?;
        self.read_peers();
        self.dispatch_ready_frames()?;
        self.read_udp_host()?;
        self.emit_due_pings();
        self.reap_disconnected();
        Ok(())
    }

    fn tick_client(&mut self) -> Result<()> {
        self.read_from_host();
        self.dispatch_client_frames()?;
        self.read_udp_client()?;
        Ok(())
    }

    fn accept_incoming(&mut self) -> Result<()> {
        let listener = self.tcp_listener.as_ref().expect("host always owns a listener");
        while let Some(stream) = listener.accept()? {
            if self.peers.len() >= self.max_peers {
                drop(stream);
                continue;
            }
            let peer_id = self.next_peer_id;
            self.next_peer_id += 1;
            self.peers.push(Peer::new(peer_id, stream));
        }
        Ok(())
    }

    fn read_peers(&mut self) {
        for peer in &mut self.peers {
            if peer.pending_disconnect.is_some() {
                continue;
            }
            let result = peer.with_tcp(|tcp| tcp.read_available());
            match result {
                Ok(read) => {
                    peer.recv_buffer.extend_from_slice(&read.data);
                    if read.closed {
                        peer.pending_disconnect = Some(DisconnectReason::ConnectionClosed);
                    }
                }
                Err(_) => peer.pending_disconnect = Some(DisconnectReason::ConnectionClosed),
            }
            if peer.state != crate::peer::HandshakeState::Steady
                && peer.handshake_started_at.elapsed() > self.handshake_timeout
                && peer.pending_disconnect.is_none()
            {
                let _ = peer.send(&Frame::ConnectionRefused(crate::wire::ConnectionRefused {
                    reason: crate::error::RefusalReason::ReceiveTimeout as u32,
                }).encode());
                peer.pending_disconnect = Some(DisconnectReason::ReceiveTimeout);
            }
        }
    }

    fn dispatch_ready_frames(&mut self) -> Result<()> {
        for index in 0..self.peers.len() {
            loop {
                if self.peers[index].pending_disconnect.is_some() {
                    break;
                }
                let parsed = Frame::parse(&self.peers[index].recv_buffer);
                match parsed {
                    Ok(Some((frame, consumed))) => {
                        self.peers[index].recv_buffer.drain(..consumed);
                        self.handler_on_host_frame(index, frame);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        self.peers[index].pending_disconnect = Some(DisconnectReason::ProtocolViolation);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_udp_host(&mut self) -> Result<()> {
        while let Some((bytes, from)) = self.udp.recv_from()? {
            self.handle_udp_datagram(from, bytes);
        }
        Ok(())
    }

    fn emit_due_pings(&mut self) {
        let interval = self.ping_interval;
        for peer in &mut self.peers {
            if peer.state != crate::peer::HandshakeState::Steady || peer.pending_disconnect.is_some() {
                continue;
            }
            let due = match peer.last_ping_sent_at {
                None => true,
                Some(t) => peer.outstanding_ping.is_none() && t.elapsed() >= interval,
            };
            if !due {
                continue;
            }
            let a: u32 = rand::random();
            let b: u32 = rand::random();
            let now = Instant::now();
            peer.last_ping_sent_at = Some(now);
            peer.outstanding_ping = Some(crate::peer::OutstandingPing { sent_at: now, a, b });
            let _ = peer.send(&Frame::Ping(crate::wire::Ping { a, b }).encode());
        }
    }

    /// Removes every peer with a pending disconnect. A peer that never
    /// reached [`crate::peer::HandshakeState::Steady`] — including one
    /// vetoed by [`Callbacks::connection`] — is dropped without telling
    /// the roster, since nobody else ever learned it existed.
    fn reap_disconnected(&mut self) {
        let mut index = 0;
        while index < self.peers.len() {
            if let Some(reason) = self.peers[index].pending_disconnect {
                let peer = self.peers.remove(index);
                if peer.fully_connected {
                    let text = peer.disconnect_reason_text.clone().unwrap_or_else(|| reason.to_string());
                    self.broadcast_user_disconnected(peer.peer_id, reason, text);
                } else {
                    self.callbacks.disconnection(peer.peer_id, reason);
                }
            } else {
                index += 1;
            }
        }
    }

    fn send_to_host(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode();
        self.host_tcp
            .as_mut()
            .expect("client always owns a host connection")
            .write_all(&bytes)?;
        Ok(())
    }

    fn read_from_host(&mut self) {
        let result = self
            .host_tcp
            .as_mut()
            .expect("client always owns a host connection")
            .read_available();
        match result {
            Ok(read) => {
                self.client_recv_buffer.extend_from_slice(&read.data);
                if read.closed {
                    self.callbacks.disconnection(
                        self.own_peer_id.unwrap_or(SERVER_PEER_ID),
                        DisconnectReason::ConnectionClosed,
                    );
                }
            }
            Err(e) => warn!("error reading from host: {e}"),
        }
    }

    fn dispatch_client_frames(&mut self) -> Result<()> {
        loop {
            match Frame::parse(&self.client_recv_buffer) {
                Ok(Some((frame, consumed))) => {
                    self.client_recv_buffer.drain(..consumed);
                    self.handler_on_client_frame(frame)?;
                }
                Ok(None) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn read_udp_client(&mut self) -> Result<()> {
        while let Some((bytes, _from)) = self.udp.recv_from()? {
            if let Ok(packet) = crate::system_link::SystemLinkPacket::new(bytes) {
                let mut allow = true;
                self.callbacks.system_link_packet(&packet, &mut allow);
            }
        }
        Ok(())
    }

    /// Sends a chat message. `recipient = None` is public chat.
    pub fn send_message(&mut self, recipient: Option<PeerId>, text: &str) -> Result<()> {
        if self.is_client {
            let recipient_id = recipient.unwrap_or(crate::wire::PUBLIC_RECIPIENT);
            self.send_to_host(&Frame::MessageSent(crate::wire::MessageSent {
                recipient_id,
                text: text.to_string(),
            }))
        } else {
            self.host_broadcast_message(None, recipient, text)
        }
    }

    /// Drops `target`. `requester` must be an operator or [`SERVER_PEER_ID`].
    /// `reason`, if given, replaces the default `"kicked by operator"` text
    /// broadcast to the rest of the roster in `UserDisconnected.reason`.
    pub fn drop_peer(&mut self, requester: PeerId, target: PeerId, reason: Option<&str>) -> Result<()> {
        if !self.is_authorized(requester) {
            self.callbacks.error(Some(requester), "permission denied: drop requires operator");
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        if let Some(peer) = self.peers.iter_mut().find(|p| p.peer_id == target) {
            peer.pending_disconnect = Some(DisconnectReason::Kicked);
            peer.disconnect_reason_text = reason.map(str::to_string);
        }
        Ok(())
    }

    /// Grants or revokes operator status on `target`. `reason`, if given,
    /// is appended to the chat message broadcast to every other connected
    /// peer announcing the op change.
    pub fn set_op(&mut self, requester: PeerId, target: PeerId, is_op: bool, reason: Option<&str>) -> Result<()> {
        if !self.is_authorized(requester) {
            self.callbacks.error(Some(requester), "permission denied: set_op requires operator");
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        if let Some(peer) = self.peers.iter_mut().find(|p| p.peer_id == target) {
            peer.is_op = is_op;
            let name = peer.name().to_string();
            let verb = if is_op { "opped" } else { "deopped" };
            let text = match reason {
                Some(r) => format!("{name} was {verb}: {r}"),
                None => format!("{name} was {verb}"),
            };
            self.broadcast_system_message(Some(target), &text);
        }
        Ok(())
    }

    /// Renames the server itself (the host's display identity).
    pub fn set_server_name(&mut self, requester: PeerId, name: &str) -> Result<()> {
        if !self.is_authorized(requester) {
            self.callbacks.error(Some(requester), "permission denied: rename requires operator");
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        self.server_name = name.to_string();
        Ok(())
    }

    fn is_authorized(&self, requester: PeerId) -> bool {
        requester == SERVER_PEER_ID
            || self
                .peers
                .iter()
                .find(|p| p.peer_id == requester)
                .map(|p| p.is_op)
                .unwrap_or(false)
    }
}

trait ResolveBind {
    fn resolve_bind(addr: &str) -> Result<SocketAddress>;
}

impl ResolveBind for SocketAddress {
    fn resolve_bind(addr: &str) -> Result<SocketAddress> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| Error::from(ErrorKind::Resolve(format!("{addr}: missing port"))))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::from(ErrorKind::Resolve(format!("{addr}: bad port"))))?;
        SocketAddress::resolve(host, port)
    }
}
