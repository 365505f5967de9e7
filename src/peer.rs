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

//! Per-peer connection state.
//!
//! A plain state record owned by the server, mutated only from the loop
//! thread, with a `parking_lot` lock guarding the one piece of state that
//! must stay serialized even in a single-threaded model — the outgoing
//! write path.

use std::io::Write;
use std::time::Instant;

use parking_lot::Mutex;

use crate::mac::MacAddress;
use crate::net::tcp_stream::TcpStream;
use crate::sockaddr::SocketAddress;
use crate::wire::PeerId;

/// Maximum number of round-trip samples retained per peer.
const PING_HISTORY: usize = 5;

/// A ping sent but not yet answered.
#[derive(Clone, Copy, Debug)]
pub struct OutstandingPing {
    pub sent_at: Instant,
    pub a: u32,
    pub b: u32,
}

/// A fixed-capacity ring buffer of the most recent round-trip samples.
///
/// Split out from [`Peer`] so the "`ping_count == min(pongs_received, 5)`"
/// invariant can be tested without a live socket.
#[derive(Clone, Copy, Debug, Default)]
pub struct PingHistory {
    samples: [u32; PING_HISTORY],
    count: usize,
    cursor: usize,
}

impl PingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new sample and returns the new integer mean if it
    /// differs from the mean before this sample, so the caller knows
    /// whether an `UpdateUser` broadcast is warranted.
    pub fn record(&mut self, sample_ms: u32) -> Option<u32> {
        let before = self.mean();
        self.samples[self.cursor] = sample_ms;
        self.cursor = (self.cursor + 1) % PING_HISTORY;
        self.count = (self.count + 1).min(PING_HISTORY);
        let after = self.mean();
        if after != before {
            after
        } else {
            None
        }
    }

    /// The integer mean of the recorded samples, or `None` before the
    /// first one arrives.
    pub fn mean(&self) -> Option<u32> {
        if self.count == 0 {
            return None;
        }
        let sum: u64 = self.samples[..self.count].iter().map(|&v| v as u64).sum();
        Some((sum / self.count as u64) as u32)
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Where a connection sits in the host-side handshake state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitHandshake,
    AwaitConnectionInformation,
    Steady,
}

/// One connected peer, from the host's point of view.
pub struct Peer {
    pub peer_id: PeerId,
    tcp: Mutex<TcpStream>,
    pub udp_endpoint: Option<SocketAddress>,
    /// The Ethernet source MAC this peer's own system-link traffic has
    /// been observed to use, learned the first time a frame from this
    /// peer validates. Other peers' frames addressed to this MAC (or to
    /// the broadcast MAC) are routed here.
    pub learned_mac: Option<MacAddress>,
    pub fully_connected: bool,
    pub is_op: bool,
    name: String,
    pings: PingHistory,
    pub last_ping_sent_at: Option<Instant>,
    pub outstanding_ping: Option<OutstandingPing>,
    pub handshake_started_at: Instant,
    pub recv_buffer: Vec<u8>,
    pub pending_disconnect: Option<crate::error::DisconnectReason>,
    /// Overrides the wire text sent for `pending_disconnect`, e.g. a
    /// custom reason given to an operator's `drop`. `None` falls back to
    /// the reason's own `Display` text.
    pub disconnect_reason_text: Option<String>,
    pub state: HandshakeState,
}

impl Peer {
    pub fn new(peer_id: PeerId, tcp: TcpStream) -> Self {
        Peer {
            peer_id,
            tcp: Mutex::new(tcp),
            udp_endpoint: None,
            learned_mac: None,
            fully_connected: false,
            is_op: false,
            name: String::new(),
            pings: PingHistory::new(),
            last_ping_sent_at: None,
            outstanding_ping: None,
            handshake_started_at: Instant::now(),
            recv_buffer: Vec::new(),
            pending_disconnect: None,
            disconnect_reason_text: None,
            state: HandshakeState::AwaitHandshake,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the peer's display name, truncated to the 32-byte wire slot
    /// (bounded to at most 32 UTF-8 bytes).
    pub fn set_name(&mut self, name: &str) {
        let mut truncated = name.to_string();
        while truncated.len() > 32 {
            truncated.pop();
        }
        self.name = truncated;
    }

    /// Serializes a single write to this peer's TCP stream. The lock is
    /// uncontended in the single-threaded event loop but is kept as the
    /// interface invariant this crate relies on, so a future background
    /// writer stays correct without further changes here.
    pub fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        self.tcp.lock().write_all(bytes)
    }

    pub fn with_tcp<R>(&self, f: impl FnOnce(&mut TcpStream) -> R) -> R {
        f(&mut self.tcp.lock())
    }

    /// Records a round-trip sample; returns `Some(mean)` when the mean
    /// changed (the caller broadcasts `UpdateUser` in that case).
    pub fn record_ping_ms(&mut self, sample_ms: u32) -> Option<u32> {
        self.pings.record(sample_ms)
    }

    pub fn ping_ms(&self) -> Option<u32> {
        self.pings.mean()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.count()
    }
}

/// The client side's handshake state machine, a mirror image of
/// [`HandshakeState`] but driven by the frames the host sends back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    SentHandshake,
    AwaitHandshakeResponse,
    SentConnectionInformation,
    AwaitConnectionInformationAck,
    Steady,
}

/// A client instance's read-only view of one other peer, kept in sync
/// with the host's authoritative list via `UpdateUser`/`UserDisconnected`.
/// Unlike [`Peer`], this holds no socket: the client has exactly one TCP
/// connection, to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePeerInfo {
    pub peer_id: PeerId,
    pub name: String,
    pub ping_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_mean_is_none_until_first_sample() {
        assert_eq!(PingHistory::new().mean(), None);
    }

    #[test]
    fn ping_mean_is_integer_average() {
        let mut history = PingHistory::new();
        history.record(10);
        history.record(20);
        assert_eq!(history.mean(), Some(15));

        let mut truncating = PingHistory::new();
        truncating.record(10);
        truncating.record(11);
        assert_eq!(truncating.mean(), Some(10)); // integer truncation, not rounding
    }

    #[test]
    fn count_caps_at_five_and_equals_min_of_samples_seen() {
        let mut history = PingHistory::new();
        for (i, sample) in (1..=8u32).enumerate() {
            history.record(sample);
            assert_eq!(history.count(), (i + 1).min(5));
        }
        assert_eq!(history.count(), 5);
    }

    #[test]
    fn oldest_sample_is_evicted_once_full() {
        let mut history = PingHistory::new();
        for sample in [10, 10, 10, 10, 10] {
            history.record(sample);
        }
        assert_eq!(history.mean(), Some(10));
        // A 6th sample evicts the first 10, replacing it with 60.
        let changed = history.record(60);
        assert_eq!(history.mean(), Some((10 * 4 + 60) / 5));
        assert_eq!(changed, Some((10 * 4 + 60) / 5));
    }

    #[test]
    fn record_returns_none_when_mean_unchanged() {
        let mut history = PingHistory::new();
        assert_eq!(history.record(10), Some(10));
        assert_eq!(history.record(10), None);
    }

    #[test]
    fn name_is_truncated_to_32_bytes() {
        let long_name = "x".repeat(40);
        assert!(long_name.len() > 32);
        let mut truncated = long_name.clone();
        while truncated.len() > 32 {
            truncated.pop();
        }
        assert_eq!(truncated.len(), 32);
    }
}
