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

//! Wire control frames.
//!
//! Parses once into a typed value keyed on a fixed-size tag field, then
//! routes on the variant — never open polymorphism.

use crate::endian::{BigU16, BigU32, BigU64};
use crate::error::{Error, ErrorKind, Result};

/// Peer identity assigned by the host. `PeerId::MAX` is the reserved
/// *server* identity.
pub type PeerId = u64;

/// The current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// `MessageSent.recipient_id` sentinel meaning "public chat".
pub const PUBLIC_RECIPIENT: PeerId = i64::MAX as u64;

/// Bit 1 (value `0b10`) of `MessageReceived.flags`: the message was a
/// public broadcast rather than a private whisper.
pub const FLAG_PUBLIC: u8 = 0b10;

mod tag {
    pub const HANDSHAKE: u16 = 0xFEFF;
    pub const HANDSHAKE_RESPONSE: u16 = 0xFF00;
    pub const CONNECTION_INFORMATION: u16 = 0xFF01;
    pub const CONNECTION_INFORMATION_ACK: u16 = 0xFF02;
    pub const CONNECTION_REFUSED: u16 = 0xFFFF;
    pub const PING: u16 = 0x0000;
    pub const PONG: u16 = 0x0001;
    pub const MESSAGE_SENT: u16 = 0x0002;
    pub const MESSAGE_RECEIVED: u16 = 0x0003;
    pub const UPDATE_USER: u16 = 0x0004;
    pub const USER_DISCONNECTED: u16 = 0x0005;
    pub const UDP_PACKET: u16 = 0x0006;
    pub const UDP_PACKET_RECEIVED: u16 = 0x0007;
}

/// A fixed 32-byte zero-padded UTF-8 name/reason slot.
fn write_padded(dst: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
    for b in dst.iter_mut().skip(n) {
        *b = 0;
    }
}

/// Reads a zero-padded UTF-8 slot, stopping at the first zero byte.
fn read_padded(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResponse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInformation {
    pub requested_name: String,
    pub password_verifier: [u8; 62],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInformationAcknowledged {
    pub peer_id: PeerId,
    pub udp_port: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionRefused {
    pub reason: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ping {
    pub a: u32,
    pub b: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pong {
    pub xor_ab: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSent {
    pub recipient_id: PeerId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageReceived {
    pub sender_id: PeerId,
    pub public: bool,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateUser {
    pub peer_id: PeerId,
    pub name: String,
    pub ping_ms: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDisconnected {
    pub peer_id: PeerId,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpPacket {
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpPacketReceived {
    pub sender_peer_id: PeerId,
    pub payload: Vec<u8>,
}

/// A fully decoded control frame, tagged by its wire type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Handshake(Handshake),
    HandshakeResponse(HandshakeResponse),
    ConnectionInformation(ConnectionInformation),
    ConnectionInformationAcknowledged(ConnectionInformationAcknowledged),
    ConnectionRefused(ConnectionRefused),
    Ping(Ping),
    Pong(Pong),
    MessageSent(MessageSent),
    MessageReceived(MessageReceived),
    UpdateUser(UpdateUser),
    UserDisconnected(UserDisconnected),
    UdpPacket(UdpPacket),
    UdpPacketReceived(UdpPacketReceived),
}

impl Frame {
    /// Encodes this frame to its bit-exact wire representation.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Handshake(f) => {
                let mut out = BigU16::new(tag::HANDSHAKE).as_bytes().to_vec();
                out.extend_from_slice(BigU32::new(f.protocol_version).as_bytes());
                out
            }
            Frame::HandshakeResponse(_) => BigU16::new(tag::HANDSHAKE_RESPONSE).as_bytes().to_vec(),
            Frame::ConnectionInformation(f) => {
                let mut out = BigU16::new(tag::CONNECTION_INFORMATION).as_bytes().to_vec();
                let mut name = [0u8; 32];
                write_padded(&mut name, &f.requested_name);
                out.extend_from_slice(&name);
                out.extend_from_slice(&f.password_verifier);
                out
            }
            Frame::ConnectionInformationAcknowledged(f) => {
                let mut out = BigU16::new(tag::CONNECTION_INFORMATION_ACK).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.peer_id).as_bytes());
                out.extend_from_slice(BigU16::new(f.udp_port).as_bytes());
                out
            }
            Frame::ConnectionRefused(f) => {
                let mut out = BigU16::new(tag::CONNECTION_REFUSED).as_bytes().to_vec();
                out.extend_from_slice(BigU32::new(f.reason).as_bytes());
                out
            }
            Frame::Ping(f) => {
                let mut out = BigU16::new(tag::PING).as_bytes().to_vec();
                out.extend_from_slice(BigU32::new(f.a).as_bytes());
                out.extend_from_slice(BigU32::new(f.b).as_bytes());
                out
            }
            Frame::Pong(f) => {
                let mut out = BigU16::new(tag::PONG).as_bytes().to_vec();
                out.extend_from_slice(BigU32::new(f.xor_ab).as_bytes());
                out
            }
            Frame::MessageSent(f) => {
                let mut out = BigU16::new(tag::MESSAGE_SENT).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.recipient_id).as_bytes());
                out.extend_from_slice(BigU16::new(f.text.len() as u16).as_bytes());
                out.extend_from_slice(f.text.as_bytes());
                out
            }
            Frame::MessageReceived(f) => {
                let mut out = BigU16::new(tag::MESSAGE_RECEIVED).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.sender_id).as_bytes());
                out.push(if f.public { FLAG_PUBLIC } else { 0 });
                out.extend_from_slice(BigU16::new(f.text.len() as u16).as_bytes());
                out.extend_from_slice(f.text.as_bytes());
                out
            }
            Frame::UpdateUser(f) => {
                let mut out = BigU16::new(tag::UPDATE_USER).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.peer_id).as_bytes());
                let mut name = [0u8; 32];
                write_padded(&mut name, &f.name);
                out.extend_from_slice(&name);
                out.extend_from_slice(BigU32::new(f.ping_ms).as_bytes());
                out
            }
            Frame::UserDisconnected(f) => {
                let mut out = BigU16::new(tag::USER_DISCONNECTED).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.peer_id).as_bytes());
                let mut reason = [0u8; 64];
                write_padded(&mut reason, &f.reason);
                out.extend_from_slice(&reason);
                out
            }
            Frame::UdpPacket(f) => {
                let mut out = BigU16::new(tag::UDP_PACKET).as_bytes().to_vec();
                out.extend_from_slice(BigU16::new(f.payload.len() as u16).as_bytes());
                out.extend_from_slice(&f.payload);
                out
            }
            Frame::UdpPacketReceived(f) => {
                let mut out = BigU16::new(tag::UDP_PACKET_RECEIVED).as_bytes().to_vec();
                out.extend_from_slice(BigU64::new(f.sender_peer_id).as_bytes());
                out.extend_from_slice(BigU16::new(f.payload.len() as u16).as_bytes());
                out.extend_from_slice(&f.payload);
                out
            }
        }
    }

    /// Attempts to parse one complete frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` holds an incomplete frame (the caller
    /// should wait for more bytes), `Ok(Some((frame, consumed)))` on
    /// success, and `Err` for an unknown tag or an internally inconsistent
    /// length field — both are protocol violations.
    pub fn parse(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let wire_tag = BigU16::read(buf).get();

        macro_rules! need {
            ($len:expr) => {
                if buf.len() < $len {
                    return Ok(None);
                }
            };
        }

        match wire_tag {
            tag::HANDSHAKE => {
                need!(6);
                let protocol_version = BigU32::read(&buf[2..]).get();
                Ok(Some((Frame::Handshake(Handshake { protocol_version }), 6)))
            }
            tag::HANDSHAKE_RESPONSE => {
                need!(2);
                Ok(Some((Frame::HandshakeResponse(HandshakeResponse), 2)))
            }
            tag::CONNECTION_INFORMATION => {
                need!(96);
                let requested_name = read_padded(&buf[2..34]);
                let mut password_verifier = [0u8; 62];
                password_verifier.copy_from_slice(&buf[34..96]);
                Ok(Some((
                    Frame::ConnectionInformation(ConnectionInformation {
                        requested_name,
                        password_verifier,
                    }),
                    96,
                )))
            }
            tag::CONNECTION_INFORMATION_ACK => {
                need!(12);
                let peer_id = BigU64::read(&buf[2..]).get();
                let udp_port = BigU16::read(&buf[10..]).get();
                Ok(Some((
                    Frame::ConnectionInformationAcknowledged(ConnectionInformationAcknowledged {
                        peer_id,
                        udp_port,
                    }),
                    12,
                )))
            }
            tag::CONNECTION_REFUSED => {
                need!(6);
                let reason = BigU32::read(&buf[2..]).get();
                Ok(Some((Frame::ConnectionRefused(ConnectionRefused { reason }), 6)))
            }
            tag::PING => {
                need!(10);
                let a = BigU32::read(&buf[2..]).get();
                let b = BigU32::read(&buf[6..]).get();
                Ok(Some((Frame::Ping(Ping { a, b }), 10)))
            }
            tag::PONG => {
                need!(6);
                let xor_ab = BigU32::read(&buf[2..]).get();
                Ok(Some((Frame::Pong(Pong { xor_ab }), 6)))
            }
            tag::MESSAGE_SENT => {
                need!(12);
                let recipient_id = BigU64::read(&buf[2..]).get();
                let length = BigU16::read(&buf[10..]).get() as usize;
                need!(12 + length);
                let text = String::from_utf8(buf[12..12 + length].to_vec())
                    .map_err(|e| Error::from(ErrorKind::Protocol(format!("MessageSent: {e}"))))?;
                Ok(Some((Frame::MessageSent(MessageSent { recipient_id, text }), 12 + length)))
            }
            tag::MESSAGE_RECEIVED => {
                need!(13);
                let sender_id = BigU64::read(&buf[2..]).get();
                let flags = buf[10];
                let length = BigU16::read(&buf[11..]).get() as usize;
                need!(13 + length);
                let text = String::from_utf8(buf[13..13 + length].to_vec())
                    .map_err(|e| Error::from(ErrorKind::Protocol(format!("MessageReceived: {e}"))))?;
                Ok(Some((
                    Frame::MessageReceived(MessageReceived {
                        sender_id,
                        public: flags & FLAG_PUBLIC != 0,
                        text,
                    }),
                    13 + length,
                )))
            }
            tag::UPDATE_USER => {
                need!(46);
                let peer_id = BigU64::read(&buf[2..]).get();
                let name = read_padded(&buf[10..42]);
                let ping_ms = BigU32::read(&buf[42..]).get();
                Ok(Some((Frame::UpdateUser(UpdateUser { peer_id, name, ping_ms }), 46)))
            }
            tag::USER_DISCONNECTED => {
                need!(74);
                let peer_id = BigU64::read(&buf[2..]).get();
                let reason = read_padded(&buf[10..74]);
                Ok(Some((Frame::UserDisconnected(UserDisconnected { peer_id, reason }), 74)))
            }
            tag::UDP_PACKET => {
                need!(4);
                let length = BigU16::read(&buf[2..]).get() as usize;
                need!(4 + length);
                let payload = buf[4..4 + length].to_vec();
                Ok(Some((Frame::UdpPacket(UdpPacket { payload }), 4 + length)))
            }
            tag::UDP_PACKET_RECEIVED => {
                need!(12);
                let sender_peer_id = BigU64::read(&buf[2..]).get();
                let length = BigU16::read(&buf[10..]).get() as usize;
                need!(12 + length);
                let payload = buf[12..12 + length].to_vec();
                Ok(Some((
                    Frame::UdpPacketReceived(UdpPacketReceived {
                        sender_peer_id,
                        payload,
                    }),
                    12 + length,
                )))
            }
            other => Err(Error::from(ErrorKind::Protocol(format!("unknown frame tag 0x{other:04X}")))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trip() {
        let frame = Frame::Handshake(Handshake { protocol_version: 1 });
        let bytes = frame.encode();
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0x00, 0x00, 0x01]);
        let (parsed, consumed) = Frame::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn connection_information_round_trip() {
        let mut password_verifier = [0u8; 62];
        password_verifier[0] = 0xAB;
        let frame = Frame::ConnectionInformation(ConnectionInformation {
            requested_name: "alice".to_string(),
            password_verifier,
        });
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 96);
        let (parsed, consumed) = Frame::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(consumed, 96);
    }

    #[test]
    fn ping_pong_xor_value() {
        // Ping(DEADBEEF, CAFEBABE) -> Pong(1407050F)
        let ping = Frame::Ping(Ping {
            a: 0xDEAD_BEEF,
            b: 0xCAFE_BABE,
        });
        let bytes = ping.encode();
        assert_eq!(&bytes[2..6], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&bytes[6..10], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let xor_ab = 0xDEAD_BEEFu32 ^ 0xCAFE_BABEu32;
        assert_eq!(xor_ab, 0x1407_050F);
        let pong = Frame::Pong(Pong { xor_ab });
        assert_eq!(pong.encode(), vec![0x00, 0x01, 0x14, 0x07, 0x05, 0x0F]);
    }

    #[test]
    fn message_sent_round_trip_with_payload() {
        let frame = Frame::MessageSent(MessageSent {
            recipient_id: PUBLIC_RECIPIENT,
            text: "hello".to_string(),
        });
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 12 + 5);
        let (parsed, consumed) = Frame::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn incomplete_variable_frame_requests_more_bytes() {
        let frame = Frame::MessageSent(MessageSent {
            recipient_id: 7,
            text: "this is a longer message".to_string(),
        });
        let bytes = frame.encode();
        // Only the fixed header, no payload yet.
        assert!(Frame::parse(&bytes[..12]).unwrap().is_none());
        // Header plus partial payload.
        assert!(Frame::parse(&bytes[..bytes.len() - 1]).unwrap().is_none());
        assert!(Frame::parse(&bytes).unwrap().is_some());
    }

    #[test]
    fn two_queued_frames_parse_independently() {
        let a = Frame::Pong(Pong { xor_ab: 1 });
        let b = Frame::HandshakeResponse(HandshakeResponse);
        let mut buf = a.encode();
        buf.extend(b.encode());

        let (parsed_a, consumed_a) = Frame::parse(&buf).unwrap().unwrap();
        assert_eq!(parsed_a, a);
        let (parsed_b, consumed_b) = Frame::parse(&buf[consumed_a..]).unwrap().unwrap();
        assert_eq!(parsed_b, b);
        assert_eq!(consumed_a + consumed_b, buf.len());
    }

    #[test]
    fn unknown_tag_is_a_protocol_violation() {
        let bytes = [0x12, 0x34, 0, 0, 0, 0];
        assert!(Frame::parse(&bytes).is_err());
    }

    #[test]
    fn name_slot_reads_up_to_first_zero_byte() {
        let mut name = [0x41u8; 32]; // all 'A'
        name[5] = 0;
        name[6] = 0x42; // must be ignored, it's after the terminator
        assert_eq!(read_padded(&name), "AAAAA");
    }
}
