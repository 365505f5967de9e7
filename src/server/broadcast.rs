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

//! Outgoing fan-out: helpers that push frames to peers but never read
//! an incoming one.

use crate::error::DisconnectReason;
use crate::system_link::SystemLinkPacket;
use crate::wire::{Frame, MessageReceived, PeerId, UdpPacketReceived, UpdateUser, UserDisconnected};

use super::{Callbacks, Server, SERVER_PEER_ID};

impl<C: Callbacks> Server<C> {
    /// Sends an `UpdateUser` for `self.peers[index]` to every other
    /// fully-connected peer, in peer-list order.
    pub(super) fn broadcast_update_user(&mut self, index: usize) {
        let peer_id = self.peers[index].peer_id;
        let name = self.peers[index].name().to_string();
        let ping_ms = self.peers[index].ping_ms().unwrap_or(0);
        let frame = Frame::UpdateUser(UpdateUser { peer_id, name, ping_ms }).encode();
        for (i, peer) in self.peers.iter().enumerate() {
            if i != index && peer.fully_connected {
                let _ = peer.send(&frame);
            }
        }
    }

    /// Brings a newly-accepted peer up to date with every peer already on
    /// the roster, sent before that peer is announced to anyone else.
    pub(super) fn send_existing_roster_to(&mut self, index: usize) {
        let updates: Vec<Vec<u8>> = self
            .peers
            .iter()
            .enumerate()
            .filter(|&(i, p)| i != index && p.fully_connected)
            .map(|(_, p)| {
                Frame::UpdateUser(UpdateUser {
                    peer_id: p.peer_id,
                    name: p.name().to_string(),
                    ping_ms: p.ping_ms().unwrap_or(0),
                })
                .encode()
            })
            .collect();
        for frame in updates {
            let _ = self.peers[index].send(&frame);
        }
    }

    /// Tells every remaining fully-connected peer that `peer_id` is gone,
    /// then fires the disconnection callback once on the host's behalf.
    /// `text` is the wire reason string, normally `reason.to_string()`
    /// but overridable (e.g. an operator's custom `drop` reason).
    pub(super) fn broadcast_user_disconnected(&mut self, peer_id: PeerId, reason: DisconnectReason, text: String) {
        let frame = Frame::UserDisconnected(UserDisconnected { peer_id, reason: text }).encode();
        for peer in &self.peers {
            if peer.fully_connected {
                let _ = peer.send(&frame);
            }
        }
        self.callbacks.disconnection(peer_id, reason);
    }

    /// Routes a chat message from the host's side: `PUBLIC_RECIPIENT`
    /// fans out to every fully-connected peer except the sender;
    /// otherwise it is delivered only to the named recipient.
    pub(super) fn host_broadcast_message(
        &mut self,
        sender: Option<PeerId>,
        recipient: Option<PeerId>,
        text: &str,
    ) -> crate::error::Result<()> {
        let sender_id = sender.unwrap_or(SERVER_PEER_ID);
        match recipient {
            None => {
                let frame = Frame::MessageReceived(MessageReceived {
                    sender_id,
                    public: true,
                    text: text.to_string(),
                })
                .encode();
                for peer in &self.peers {
                    if peer.fully_connected && Some(peer.peer_id) != sender {
                        let _ = peer.send(&frame);
                    }
                }
            }
            Some(recipient_id) => {
                let frame = Frame::MessageReceived(MessageReceived {
                    sender_id,
                    public: false,
                    text: text.to_string(),
                })
                .encode();
                if let Some(peer) = self.peers.iter().find(|p| p.peer_id == recipient_id && p.fully_connected) {
                    let _ = peer.send(&frame);
                }
            }
        }
        Ok(())
    }

    /// Broadcasts a host-originated system message (e.g. an op-change
    /// announcement) to every fully-connected peer except `exclude`.
    pub(super) fn broadcast_system_message(&mut self, exclude: Option<PeerId>, text: &str) {
        let frame = Frame::MessageReceived(MessageReceived {
            sender_id: SERVER_PEER_ID,
            public: true,
            text: text.to_string(),
        })
        .encode();
        for peer in &self.peers {
            if peer.fully_connected && Some(peer.peer_id) != exclude {
                let _ = peer.send(&frame);
            }
        }
    }

    /// Relays a validated system-link frame to every peer whose learned
    /// MAC can receive it, preferring a direct UDP datagram and falling
    /// back to a TCP-tunneled `UdpPacketReceived` when the peer's UDP
    /// endpoint has not been learned yet.
    pub(super) fn forward_system_link(&mut self, sender_id: Option<PeerId>, packet: SystemLinkPacket) {
        if let Some(id) = sender_id {
            if let Some(peer) = self.peers.iter_mut().find(|p| p.peer_id == id) {
                peer.learned_mac = Some(packet.source_mac());
            }
        }

        let mut allow = true;
        self.callbacks.system_link_packet(&packet, &mut allow);
        if !allow {
            return;
        }

        let destination_mac = packet.destination_mac();
        let raw = packet.raw().to_vec();
        let targets: Vec<(PeerId, Option<crate::sockaddr::SocketAddress>)> = self
            .peers
            .iter()
            .filter(|p| {
                Some(p.peer_id) != sender_id
                    && p.fully_connected
                    && p.learned_mac.map(|mac| destination_mac.can_send_to(mac)).unwrap_or(false)
            })
            .map(|p| (p.peer_id, p.udp_endpoint))
            .collect();

        for (peer_id, udp_endpoint) in targets {
            match udp_endpoint {
                Some(endpoint) => {
                    let _ = self.udp.send_to(&raw, endpoint);
                }
                None => {
                    if let Some(peer) = self.peers.iter().find(|p| p.peer_id == peer_id) {
                        let frame = Frame::UdpPacketReceived(UdpPacketReceived {
                            sender_peer_id: sender_id.unwrap_or(SERVER_PEER_ID),
                            payload: raw.clone(),
                        })
                        .encode();
                        let _ = peer.send(&frame);
                    }
                }
            }
        }
    }
}
