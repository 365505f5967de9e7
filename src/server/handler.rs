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

//! Per-frame dispatch: one function per wire state, routing on the
//! decoded [`Frame`] variant rather than re-parsing anything.

use log::{debug, info, warn};

use crate::error::{DisconnectReason, RefusalReason};
use crate::peer::{ClientState, HandshakeState};
use crate::sockaddr::SocketAddress;
use crate::system_link::SystemLinkPacket;
use crate::wire::{
    ConnectionInformationAcknowledged, ConnectionRefused, Frame, HandshakeResponse, MessageReceived, Ping,
    Pong, PeerId, PROTOCOL_VERSION, PUBLIC_RECIPIENT,
};

use super::{Callbacks, Server, SERVER_PEER_ID};

impl<C: Callbacks> Server<C> {
    pub(super) fn handler_on_host_frame(&mut self, index: usize, frame: Frame) {
        match self.peers[index].state {
            HandshakeState::AwaitHandshake => self.on_handshake(index, frame),
            HandshakeState::AwaitConnectionInformation => self.on_connection_information(index, frame),
            HandshakeState::Steady => self.on_steady_frame(index, frame),
        }
    }

    fn on_handshake(&mut self, index: usize, frame: Frame) {
        let Frame::Handshake(handshake) = frame else {
            self.peers[index].pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            return;
        };
        if handshake.protocol_version != PROTOCOL_VERSION {
            let reason = if handshake.protocol_version < PROTOCOL_VERSION {
                RefusalReason::VersionTooOld
            } else {
                RefusalReason::VersionTooNew
            };
            let _ = self.peers[index].send(&Frame::ConnectionRefused(ConnectionRefused { reason: reason as u32 }).encode());
            self.peers[index].pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            return;
        }
        let _ = self.peers[index].send(&Frame::HandshakeResponse(HandshakeResponse).encode());
        self.peers[index].state = HandshakeState::AwaitConnectionInformation;
        debug!("peer {} passed handshake", self.peers[index].peer_id);
    }

    fn on_connection_information(&mut self, index: usize, frame: Frame) {
        let Frame::ConnectionInformation(ci) = frame else {
            self.peers[index].pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            return;
        };
        if !self.password_verifier.verify(&ci.password_verifier) {
            let _ = self.peers[index].send(
                &Frame::ConnectionRefused(ConnectionRefused { reason: RefusalReason::ReceiveTimeout as u32 }).encode(),
            );
            self.peers[index].pending_disconnect = Some(DisconnectReason::ReceiveTimeout);
            return;
        }
        let name = match self.disambiguate_name(&ci.requested_name) {
            Some(name) => name,
            None => {
                let _ = self.peers[index].send(
                    &Frame::ConnectionRefused(ConnectionRefused { reason: RefusalReason::ReceiveTimeout as u32 })
                        .encode(),
                );
                self.peers[index].pending_disconnect = Some(DisconnectReason::ReceiveTimeout);
                return;
            }
        };

        self.peers[index].set_name(&name);
        self.peers[index].state = HandshakeState::Steady;
        let peer_id = self.peers[index].peer_id;

        let mut allow = true;
        self.callbacks.connection(peer_id, &name, &mut allow);
        if !allow {
            debug!("peer {peer_id} connection vetoed by the connection callback");
            self.peers[index].pending_disconnect = Some(DisconnectReason::Kicked);
            return;
        }

        self.peers[index].fully_connected = true;
        let udp_port = self.udp.local_addr().map(|a| a.port()).unwrap_or(0);
        let _ = self.peers[index].send(
            &Frame::ConnectionInformationAcknowledged(ConnectionInformationAcknowledged { peer_id, udp_port })
                .encode(),
        );

        info!("peer {peer_id} joined as \"{name}\"");
        self.send_existing_roster_to(index);
        self.broadcast_update_user(index);
    }

    fn disambiguate_name(&self, requested: &str) -> Option<String> {
        let requested = if requested.is_empty() { "peer" } else { requested };
        let base = truncate32(requested);
        if !self.peers.iter().any(|p| p.name() == base) {
            return Some(base);
        }
        for suffix in 2..1000u32 {
            let suffix = format!("_{suffix}");
            let candidate = format!("{}{}", truncate_to(&base, 32 - suffix.len()), suffix);
            if !self.peers.iter().any(|p| p.name() == candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn on_steady_frame(&mut self, index: usize, frame: Frame) {
        match frame {
            Frame::Pong(Pong { xor_ab }) => self.on_pong(index, xor_ab),
            Frame::MessageSent(m) => self.on_message_sent(index, m.recipient_id, &m.text),
            Frame::UdpPacket(p) => self.on_tunneled_system_link(index, p.payload),
            _ => {
                self.peers[index].pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            }
        }
    }

    fn on_pong(&mut self, index: usize, xor_ab: u32) {
        let peer = &mut self.peers[index];
        let Some(outstanding) = peer.outstanding_ping.take() else {
            peer.pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            return;
        };
        if xor_ab != outstanding.a ^ outstanding.b {
            peer.pending_disconnect = Some(DisconnectReason::ProtocolViolation);
            return;
        }
        let rtt_ms = outstanding.sent_at.elapsed().as_millis().min(u32::MAX as u128) as u32;
        if let Some(mean) = peer.record_ping_ms(rtt_ms) {
            self.broadcast_update_user(index);
            let _ = mean;
        }
    }

    fn on_message_sent(&mut self, index: usize, recipient_id: PeerId, text: &str) {
        let sender_id = self.peers[index].peer_id;
        let mut allow = true;
        self.callbacks.message(Some(sender_id), text, &mut allow);
        if !allow {
            return;
        }
        let _ = self.host_broadcast_message(Some(sender_id), recipient_non_sentinel(recipient_id), text);
    }

    fn on_tunneled_system_link(&mut self, index: usize, payload: Vec<u8>) {
        let sender_id = self.peers[index].peer_id;
        match SystemLinkPacket::new(payload) {
            Ok(packet) => self.forward_system_link(Some(sender_id), packet),
            Err(e) => warn!("dropping malformed tunneled system-link frame from peer {sender_id}: {e}"),
        }
    }

    pub(super) fn handler_on_client_frame(&mut self, frame: Frame) -> crate::error::Result<()> {
        match self.client_state {
            ClientState::AwaitHandshakeResponse => self.client_on_handshake_response(frame),
            ClientState::AwaitConnectionInformationAck => self.client_on_ci_ack(frame),
            ClientState::Steady => self.client_on_steady_frame(frame),
            ClientState::SentHandshake | ClientState::SentConnectionInformation => Ok(()),
        }
    }

    fn client_on_handshake_response(&mut self, frame: Frame) -> crate::error::Result<()> {
        match frame {
            Frame::HandshakeResponse(_) => {
                let password_verifier = match &self.client_password {
                    Some(p) => self.password_verifier.derive_for(p),
                    None => [0u8; 62],
                };
                let requested_name = self.requested_name.clone();
                self.send_to_host(&Frame::ConnectionInformation(crate::wire::ConnectionInformation {
                    requested_name,
                    password_verifier,
                }))?;
                self.client_state = ClientState::AwaitConnectionInformationAck;
                Ok(())
            }
            Frame::ConnectionRefused(r) => {
                self.callbacks.error(None, &format!("handshake refused, reason {}", r.reason));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn client_on_ci_ack(&mut self, frame: Frame) -> crate::error::Result<()> {
        match frame {
            Frame::ConnectionInformationAcknowledged(ack) => {
                self.own_peer_id = Some(ack.peer_id);
                self.client_state = ClientState::Steady;
                info!("connected, assigned peer id {}", ack.peer_id);
                Ok(())
            }
            Frame::ConnectionRefused(r) => {
                self.callbacks.error(None, &format!("connection refused, reason {}", r.reason));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn client_on_steady_frame(&mut self, frame: Frame) -> crate::error::Result<()> {
        match frame {
            Frame::Ping(Ping { a, b }) => {
                self.send_to_host(&Frame::Pong(Pong { xor_ab: a ^ b }))?;
            }
            Frame::UpdateUser(u) => {
                if let Some(existing) = self.remote_peers.iter_mut().find(|p| p.peer_id == u.peer_id) {
                    existing.name = u.name;
                    existing.ping_ms = u.ping_ms;
                } else {
                    self.remote_peers.push(crate::peer::RemotePeerInfo {
                        peer_id: u.peer_id,
                        name: u.name,
                        ping_ms: u.ping_ms,
                    });
                }
            }
            Frame::UserDisconnected(d) => {
                self.remote_peers.retain(|p| p.peer_id != d.peer_id);
                self.callbacks
                    .disconnection(d.peer_id, DisconnectReason::parse_wire_text(&d.reason));
            }
            Frame::MessageReceived(MessageReceived { sender_id, public, text }) => {
                let sender = if sender_id == SERVER_PEER_ID { None } else { Some(sender_id) };
                let mut allow = true;
                self.callbacks.message(sender, &text, &mut allow);
                let _ = public;
            }
            Frame::UdpPacketReceived(p) => {
                if let Ok(packet) = SystemLinkPacket::new(p.payload) {
                    let mut allow = true;
                    self.callbacks.system_link_packet(&packet, &mut allow);
                }
            }
            Frame::ConnectionRefused(r) => {
                self.callbacks.error(None, &format!("disconnected by host, reason {}", r.reason));
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn handle_udp_datagram(&mut self, from: SocketAddress, bytes: Vec<u8>) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.udp_endpoint == Some(from)) {
            let _ = peer;
        } else if let Some(peer) = self
            .peers
            .iter_mut()
            .find(|p| p.fully_connected && p.udp_endpoint.is_none())
        {
            // Learns the sending peer's UDP endpoint the first time any
            // datagram arrives from an address not yet attributed to
            // someone else. Multiple unattributed peers racing their first
            // datagram is a known limitation of address-based learning;
            // in practice the handshake's TCP round trip serializes this.
            peer.udp_endpoint = Some(from);
        }

        let sender_id = self
            .peers
            .iter()
            .find(|p| p.udp_endpoint == Some(from))
            .map(|p| p.peer_id);

        match SystemLinkPacket::new(bytes) {
            Ok(packet) => self.forward_system_link(sender_id, packet),
            Err(e) => warn!("dropping malformed system-link datagram from {from}: {e}"),
        }
    }
}

fn recipient_non_sentinel(recipient_id: PeerId) -> Option<PeerId> {
    if recipient_id == PUBLIC_RECIPIENT {
        None
    } else {
        Some(recipient_id)
    }
}

fn truncate32(name: &str) -> String {
    truncate_to(name, 32)
}

/// Pops trailing characters until `name` fits within `max_bytes`. Used to
/// make room for a disambiguating `_N` suffix rather than discarding it.
fn truncate_to(name: &str, max_bytes: usize) -> String {
    let mut s = name.to_string();
    while s.len() > max_bytes {
        s.pop();
    }
    s
}
