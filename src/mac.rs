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

//! 6-byte physical (Ethernet) address.

use std::fmt;

/// A 6-byte Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 6];
        buf.copy_from_slice(&bytes[..6]);
        MacAddress(buf)
    }

    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// The all-ones broadcast address.
    pub fn broadcast() -> Self {
        MacAddress([0xFF; 6])
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::broadcast()
    }

    /// Whether a frame addressed to `dst` may be delivered to a peer whose
    /// learned destination MAC is `self`: either an exact match, or `self`
    /// is the broadcast address.
    pub fn can_send_to(&self, dst: MacAddress) -> bool {
        dst == *self || self.is_broadcast()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_is_all_ones() {
        assert_eq!(MacAddress::broadcast().bytes(), &[0xFF; 6]);
        assert!(MacAddress::broadcast().is_broadcast());
    }

    #[test]
    fn unicast_is_not_broadcast() {
        let mac = MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert!(!mac.is_broadcast());
    }

    #[test]
    fn can_send_to_self_or_when_broadcast_source() {
        let a = MacAddress::new([1, 2, 3, 4, 5, 6]);
        let b = MacAddress::new([6, 5, 4, 3, 2, 1]);
        assert!(a.can_send_to(a));
        assert!(!a.can_send_to(b));
        assert!(MacAddress::broadcast().can_send_to(a));
        assert!(MacAddress::broadcast().can_send_to(MacAddress::broadcast()));
    }

    #[test]
    fn display_format() {
        let mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
    }
}
