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

//! User-facing extension points.
//!
//! A trait of default-no-op callback methods, implemented by the
//! embedding application and invoked synchronously from the event loop.

use crate::error::DisconnectReason;
use crate::system_link::SystemLinkPacket;
use crate::wire::PeerId;

/// Hooks invoked synchronously from [`crate::server::Server::tick`].
///
/// Every method has a default no-op (or permissive, for the `allow` gates)
/// implementation so a consumer only overrides what it cares about.
pub trait Callbacks {
    /// Called on the host once a peer's handshake has passed, before it
    /// is announced to anyone else. Setting `allow` to `false` drops the
    /// peer silently: the roster is never told about the connection
    /// attempt, and no other peer ever learns the dropped peer existed.
    fn connection(&mut self, peer_id: PeerId, name: &str, allow: &mut bool) {
        let _ = (peer_id, name, allow);
    }

    /// Fires on both sides once a peer has been removed.
    fn disconnection(&mut self, peer_id: PeerId, reason: DisconnectReason) {
        let _ = (peer_id, reason);
    }

    /// Chat delivery gate. `sender` is `None` for a host-originated system
    /// message. `allow` starts `true` on the host and governs rebroadcast;
    /// it is ignored on the client.
    fn message(&mut self, sender: Option<PeerId>, text: &str, allow: &mut bool) {
        let _ = (sender, text, allow);
    }

    /// System-link forwarding gate. `allow` starts `true` on the host and
    /// governs whether the frame is relayed to other peers; ignored on the
    /// client.
    fn system_link_packet(&mut self, packet: &SystemLinkPacket, allow: &mut bool) {
        let _ = (packet, allow);
    }

    /// A non-fatal error surfaced out-of-band: a rejected operator action,
    /// a dropped oversized send queue, and similar conditions that don't
    /// warrant a disconnection.
    fn error(&mut self, peer_id: Option<PeerId>, message: &str) {
        let _ = (peer_id, message);
    }
}

/// A [`Callbacks`] implementation that does nothing, for tests and for
/// embedders that only care about a subset of events via composition.
#[derive(Default)]
pub struct NullCallbacks;

impl Callbacks for NullCallbacks {}
