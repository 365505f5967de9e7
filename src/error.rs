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

//! Error taxonomy.

use error_chain::error_chain;

error_chain! {
    errors {
        /// Name resolution failed (`SocketAddress::resolve`).
        Resolve(detail: String) {
            description("name resolution failed")
            display("name resolution failed: {}", detail)
        }
        /// A control frame violated the wire protocol: unknown tag, wrong
        /// length, bad password, bad pong, etc. Peer-scoped; the caller
        /// downgrades this to a disconnect rather than letting it escape
        /// `Server::tick`.
        Protocol(detail: String) {
            description("protocol violation")
            display("protocol violation: {}", detail)
        }
        /// Operator-only action attempted by a non-operator peer.
        PermissionDenied {
            description("permission denied")
            display("permission denied")
        }
        /// A requested display name could not be disambiguated within the
        /// 32-byte slot.
        NameUnavailable {
            description("name unavailable")
            display("requested name is unavailable")
        }
        /// `ConnectionInformation`'s password verifier did not match.
        PasswordRejected {
            description("password rejected")
            display("password rejected")
        }
    }

    foreign_links {
        Io(std::io::Error);
        TomlDecode(toml::de::Error);
        TomlEncode(toml::ser::Error);
    }
}

/// Reasons a peer was disconnected, surfaced to
/// [`crate::callbacks::Callbacks::disconnection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The TCP stream was closed or errored.
    ConnectionClosed,
    /// The handshake did not complete within the 10 s deadline, or a
    /// `Pong` was not received within the 5 s ping-response deadline.
    ReceiveTimeout,
    /// A malformed or out-of-sequence control frame was received.
    ProtocolViolation,
    /// An operator issued `drop`.
    Kicked,
    /// The server itself is shutting down.
    ServerShutdown,
}

impl DisconnectReason {
    /// Recovers a reason from the free-text `UserDisconnected.reason` slot
    /// the host writes via this type's own `Display` impl, falling back to
    /// `ProtocolViolation` for anything a future host version might send
    /// that this client doesn't recognize.
    pub fn parse_wire_text(text: &str) -> Self {
        match text {
            "connection closed" => DisconnectReason::ConnectionClosed,
            "receive timeout" => DisconnectReason::ReceiveTimeout,
            "kicked by operator" => DisconnectReason::Kicked,
            "server shutdown" => DisconnectReason::ServerShutdown,
            _ => DisconnectReason::ProtocolViolation,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisconnectReason::ConnectionClosed => "connection closed",
            DisconnectReason::ReceiveTimeout => "receive timeout",
            DisconnectReason::ProtocolViolation => "protocol violation",
            DisconnectReason::Kicked => "kicked by operator",
            DisconnectReason::ServerShutdown => "server shutdown",
        };
        f.write_str(s)
    }
}

/// A reason the host refused a `ConnectionInformation`/`Handshake`,
/// encoded as `ConnectionRefused.reason`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum RefusalReason {
    VersionTooOld = 0,
    VersionTooNew = 1,
    ReceiveTimeout = 2,
}

/// Validation failure for a single system-link frame.
///
/// Deliberately not part of the [`error_chain!`] hierarchy: these are
/// expected, frequent, and must be cheap to construct and discard — a
/// malformed frame drops the frame, never the peer or the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemLinkError {
    TooShort { raw_size: usize },
    NotIpv4EtherType,
    BadIpVersion,
    BadHeaderLength,
    NotUdp,
    TotalLengthMismatch,
    UdpOffsetOutOfBounds,
    SourceIpNotGameConsole,
    BroadcastSourceMac,
    DestinationMismatch { broadcast_mac: bool },
    BadGamePort,
    UdpLengthMismatch,
}

impl std::fmt::Display for SystemLinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemLinkError::TooShort { raw_size } => {
                write!(f, "frame of {raw_size} bytes is shorter than an Ethernet+IPv4 header")
            }
            SystemLinkError::NotIpv4EtherType => write!(f, "ethertype is not IPv4"),
            SystemLinkError::BadIpVersion => write!(f, "IPv4 version/IHL nibble out of range"),
            SystemLinkError::BadHeaderLength => write!(f, "IPv4 IHL is out of the [5, 15] range"),
            SystemLinkError::NotUdp => write!(f, "IPv4 protocol is not UDP"),
            SystemLinkError::TotalLengthMismatch => {
                write!(f, "IPv4 total_length + 14 does not equal the raw frame size")
            }
            SystemLinkError::UdpOffsetOutOfBounds => write!(f, "UDP header falls outside the raw frame"),
            SystemLinkError::SourceIpNotGameConsole => write!(f, "source IP is not 0.0.0.1"),
            SystemLinkError::BroadcastSourceMac => write!(f, "source MAC is the broadcast address"),
            SystemLinkError::DestinationMismatch { broadcast_mac } => {
                if *broadcast_mac {
                    write!(f, "destination IP is not 255.255.255.255 but is broadcast")
                } else {
                    write!(f, "destination IP is not 0.0.0.1 for a unicast destination MAC")
                }
            }
            SystemLinkError::BadGamePort => write!(f, "UDP source/destination port is not 3074"),
            SystemLinkError::UdpLengthMismatch => write!(f, "UDP length + udp_offset does not equal the raw frame size"),
        }
    }
}

impl std::error::Error for SystemLinkError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_reason_round_trips_through_its_wire_text() {
        for reason in [
            DisconnectReason::ConnectionClosed,
            DisconnectReason::ReceiveTimeout,
            DisconnectReason::Kicked,
            DisconnectReason::ServerShutdown,
        ] {
            assert_eq!(DisconnectReason::parse_wire_text(&reason.to_string()), reason);
        }
    }

    #[test]
    fn unrecognized_wire_text_falls_back_to_protocol_violation() {
        assert_eq!(
            DisconnectReason::parse_wire_text("some future reason"),
            DisconnectReason::ProtocolViolation
        );
    }

    #[test]
    fn refusal_reason_values_match_the_wire_table() {
        assert_eq!(RefusalReason::VersionTooOld as u32, 0);
        assert_eq!(RefusalReason::VersionTooNew as u32, 1);
        assert_eq!(RefusalReason::ReceiveTimeout as u32, 2);
    }
}
