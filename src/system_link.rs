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

//! System-link packet validator.
//!
//! A bit-exact Ethernet II + IPv4 + UDP decoder that accepts only the
//! narrow subset of frames game-console "system link" discovery traffic
//! uses. Fields are read via explicit byte offsets, never an unaligned
//! struct cast.

use crate::endian::{BigU16, BigU32};
use crate::mac::MacAddress;

const ETH_HEADER_LEN: usize = 14;
const MIN_IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// The fixed source/destination IP of all system-link traffic: `0.0.0.1`.
const GAME_CONSOLE_IP: u32 = 0x0000_0001;
const GAME_CONSOLE_PORT: u16 = 3074;

use crate::error::SystemLinkError as Error;

/// A validated Ethernet/IPv4/UDP system-link frame.
///
/// Construction via [`SystemLinkPacket::new`] is the only way to obtain
/// one, and it enforces every acceptance predicate before the frame is
/// trusted anywhere else in this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemLinkPacket {
    raw: Vec<u8>,
    udp_offset: usize,
}

impl SystemLinkPacket {
    /// Validates `raw` against every acceptance predicate and, on
    /// success, takes ownership of the frame.
    pub fn new(raw: Vec<u8>) -> Result<Self, Error> {
        let raw_size = raw.len();

        // Predicate 1.
        if raw_size < ETH_HEADER_LEN + MIN_IPV4_HEADER_LEN {
            return Err(Error::TooShort { raw_size });
        }

        // Predicate 2: ethertype is IPv4's standard wire encoding,
        // compared byte-for-byte (`08 00`) rather than as a decoded
        // big-endian integer.
        if raw[12..14] != [0x08, 0x00] {
            return Err(Error::NotIpv4EtherType);
        }

        let version_ihl = raw[14];
        let version = version_ihl >> 4;
        let ihl = version_ihl & 0x0F;

        // Predicate 3.
        if version != 4 {
            return Err(Error::BadIpVersion);
        }
        if !(5..=15).contains(&ihl) {
            return Err(Error::BadHeaderLength);
        }

        // Predicate 4.
        let protocol = raw[23];
        if protocol != 0x11 {
            return Err(Error::NotUdp);
        }

        // Predicate 5.
        let total_length = BigU16::read(&raw[16..18]).get() as usize;
        if total_length + ETH_HEADER_LEN != raw_size {
            return Err(Error::TotalLengthMismatch);
        }

        // Predicate 6: IHL counts 32-bit words, so the offset is
        // `14 + ihl * 4`, not `14 + ihl`.
        let udp_offset = ETH_HEADER_LEN + (ihl as usize) * 4;
        if udp_offset > raw_size || udp_offset + UDP_HEADER_LEN > raw_size {
            return Err(Error::UdpOffsetOutOfBounds);
        }

        // Predicate 7.
        let source_ip = BigU32::read(&raw[26..30]).get();
        if source_ip != GAME_CONSOLE_IP {
            return Err(Error::SourceIpNotGameConsole);
        }

        let source_mac = MacAddress::from_slice(&raw[6..12]);
        let destination_mac = MacAddress::from_slice(&raw[0..6]);

        // Predicate 8.
        if source_mac.is_broadcast() {
            return Err(Error::BroadcastSourceMac);
        }

        // Predicate 9.
        let destination_ip = BigU32::read(&raw[30..34]).get();
        if destination_mac.is_broadcast() {
            if destination_ip != 0xFFFF_FFFF {
                return Err(Error::DestinationMismatch { broadcast_mac: true });
            }
        } else if destination_ip != GAME_CONSOLE_IP {
            return Err(Error::DestinationMismatch { broadcast_mac: false });
        }

        // Predicate 10.
        let udp_source_port = BigU16::read(&raw[udp_offset..udp_offset + 2]).get();
        let udp_destination_port = BigU16::read(&raw[udp_offset + 2..udp_offset + 4]).get();
        if udp_source_port != GAME_CONSOLE_PORT || udp_destination_port != GAME_CONSOLE_PORT {
            return Err(Error::BadGamePort);
        }

        // Predicate 11.
        let udp_length = BigU16::read(&raw[udp_offset + 4..udp_offset + 6]).get() as usize;
        if udp_length + udp_offset != raw_size {
            return Err(Error::UdpLengthMismatch);
        }

        Ok(SystemLinkPacket { raw, udp_offset })
    }

    pub fn source_mac(&self) -> MacAddress {
        MacAddress::from_slice(&self.raw[6..12])
    }

    pub fn destination_mac(&self) -> MacAddress {
        MacAddress::from_slice(&self.raw[0..6])
    }

    /// The full accepted Ethernet/IPv4/UDP frame, unmodified.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The bytes following the UDP header.
    pub fn udp_payload(&self) -> &[u8] {
        &self.raw[self.udp_offset + UDP_HEADER_LEN..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a 60-byte unicast system-link frame, with the destination
    /// MAC/IP swappable to exercise the broadcast path.
    fn scenario_frame(destination_mac: [u8; 6], destination_ip: [u8; 4]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(60);
        frame.extend_from_slice(&destination_mac); // destination MAC
        frame.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]); // source MAC
        frame.extend_from_slice(&[0x08, 0x00]); // ethertype
        frame.push(0x45); // version=4, IHL=5
        frame.push(0x00); // DSCP/ECN
        frame.extend_from_slice(&[0x00, 0x2E]); // total_length = 46
        frame.extend_from_slice(&[0x00, 0x00]); // identification
        frame.extend_from_slice(&[0x40, 0x00]); // flags/fragment
        frame.push(0x40); // ttl
        frame.push(0x11); // protocol = UDP
        frame.extend_from_slice(&[0xAB, 0xCD]); // header checksum (unchecked)
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // source ip 0.0.0.1
        frame.extend_from_slice(&destination_ip);
        frame.extend_from_slice(&[0x0C, 0x02]); // udp source port 3074
        frame.extend_from_slice(&[0x0C, 0x02]); // udp destination port 3074
        frame.extend_from_slice(&[0x00, 0x1A]); // udp length = 26
        frame.extend_from_slice(&[0xEF, 0x12]); // udp checksum (unchecked)
        frame.extend(std::iter::repeat(0x55).take(18)); // 18 bytes of payload
        assert_eq!(frame.len(), 60);
        frame
    }

    #[test]
    fn accepts_unicast_scenario() {
        let frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        let packet = SystemLinkPacket::new(frame).expect("valid frame");
        assert_eq!(
            packet.source_mac(),
            MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
        );
        assert_eq!(packet.udp_payload().len(), 18);
    }

    #[test]
    fn accepts_broadcast_scenario() {
        let frame = scenario_frame([0xFF; 6], [0xFF, 0xFF, 0xFF, 0xFF]);
        let packet = SystemLinkPacket::new(frame).expect("valid broadcast frame");
        assert!(packet.destination_mac().is_broadcast());
    }

    #[test]
    fn rejects_broadcast_mac_with_unicast_ip() {
        let frame = scenario_frame([0xFF; 6], [0x00, 0x00, 0x00, 0x01]);
        let err = SystemLinkPacket::new(frame).unwrap_err();
        assert_eq!(err, Error::DestinationMismatch { broadcast_mac: true });
    }

    #[test]
    fn rejects_broadcast_source_mac() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[6..12].copy_from_slice(&[0xFF; 6]);
        let err = SystemLinkPacket::new(frame).unwrap_err();
        assert_eq!(err, Error::BroadcastSourceMac);
    }

    #[test]
    fn rejects_too_short_frame() {
        let err = SystemLinkPacket::new(vec![0u8; 10]).unwrap_err();
        assert_eq!(err, Error::TooShort { raw_size: 10 });
    }

    #[test]
    fn rejects_non_ipv4_ethertype() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[12..14].copy_from_slice(&[0x86, 0xDD]); // IPv6 ethertype
        assert_eq!(SystemLinkPacket::new(frame).unwrap_err(), Error::NotIpv4EtherType);
    }

    #[test]
    fn rejects_wrong_source_ip() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[26..30].copy_from_slice(&[0x0A, 0x00, 0x00, 0x01]);
        assert_eq!(
            SystemLinkPacket::new(frame).unwrap_err(),
            Error::SourceIpNotGameConsole
        );
    }

    #[test]
    fn rejects_non_game_port() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[34..36].copy_from_slice(&[0x00, 0x50]); // port 80
        assert_eq!(SystemLinkPacket::new(frame).unwrap_err(), Error::BadGamePort);
    }

    #[test]
    fn rejects_total_length_mismatch() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[16..18].copy_from_slice(&[0x00, 0x2F]);
        assert_eq!(
            SystemLinkPacket::new(frame).unwrap_err(),
            Error::TotalLengthMismatch
        );
    }

    #[test]
    fn rejects_bad_ihl() {
        let mut frame = scenario_frame([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], [0x00, 0x00, 0x00, 0x01]);
        frame[14] = 0x43; // version 4, IHL 3 (< 5)
        assert_eq!(SystemLinkPacket::new(frame).unwrap_err(), Error::BadHeaderLength);
    }
}
