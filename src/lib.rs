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

//! XLAN relay: a peer-to-peer session protocol that tunnels game-console
//! "system link" Ethernet discovery traffic between hosts over the
//! internet, via a TCP control channel and a UDP data channel.
//!
//! [`server::Server`] is the entry point: [`server::Server::host`] starts
//! a relay that other instances connect to with
//! [`server::Server::connect`]. Both sides are driven by repeatedly
//! calling [`server::Server::tick`]; the crate never spawns its own
//! thread or blocks inside a call.

pub mod auth;
pub mod callbacks;
pub mod config;
pub mod endian;
pub mod error;
pub mod mac;
pub mod net;
pub mod peer;
pub mod server;
pub mod sockaddr;
pub mod system_link;
pub mod wire;

pub use callbacks::{Callbacks, NullCallbacks};
pub use config::{ClientConfig, RelayConfig};
pub use error::{DisconnectReason, Error, ErrorKind, Result};
pub use peer::{Peer, RemotePeerInfo};
pub use server::{Server, SERVER_PEER_ID};
pub use system_link::SystemLinkPacket;
