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

//! Opaque IPv4/IPv6/any socket endpoint.
//!
//! Resolution is a thin wrapper over the standard library's own resolver,
//! not a dedicated DNS crate.

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Error, ErrorKind, Result};

/// An IPv4/IPv6 endpoint, or the unspecified placeholder used before a
/// peer's UDP endpoint has been learned.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SocketAddress {
    V4(std::net::SocketAddrV4),
    V6(std::net::SocketAddrV6),
}

impl SocketAddress {
    /// The unspecified placeholder used before a peer's UDP endpoint has
    /// been learned from its first datagram.
    pub fn unspecified() -> Self {
        SocketAddress::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 0))
    }

    /// Resolves `host:port` (or a bare IP literal) to a concrete endpoint.
    ///
    /// Fails with [`ErrorKind::Resolve`] when name resolution fails.
    pub fn resolve(host: &str, port: u16) -> Result<Self> {
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::from(ErrorKind::Resolve(format!("{host}:{port}: {e}"))))?;
        let first = candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::from(ErrorKind::Resolve(format!("{host}:{port}: no addresses"))))?;
        Ok(Self::from(first))
    }

    pub fn port(&self) -> u16 {
        match self {
            SocketAddress::V4(a) => a.port(),
            SocketAddress::V6(a) => a.port(),
        }
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, SocketAddress::V6(_))
    }

    pub fn std(&self) -> SocketAddr {
        match self {
            SocketAddress::V4(a) => SocketAddr::V4(*a),
            SocketAddress::V6(a) => SocketAddr::V6(*a),
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(a) => SocketAddress::V4(a),
            SocketAddr::V6(a) => SocketAddress::V6(a),
        }
    }
}

impl From<SocketAddress> for SocketAddr {
    fn from(addr: SocketAddress) -> Self {
        addr.std()
    }
}

impl std::fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.std())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_loopback_literal() {
        let addr = SocketAddress::resolve("127.0.0.1", 20000).unwrap();
        assert_eq!(addr.port(), 20000);
        assert!(!addr.is_v6());
    }

    #[test]
    fn resolves_ipv6_literal() {
        let addr = SocketAddress::resolve("::1", 20001).unwrap();
        assert!(addr.is_v6());
    }

    #[test]
    fn bad_name_fails_to_resolve() {
        let result = SocketAddress::resolve("this.host.does.not.exist.invalid", 80);
        assert!(result.is_err());
    }
}
