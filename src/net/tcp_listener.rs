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

use std::io;

use crate::error::Result;
use crate::sockaddr::SocketAddress;

use super::tcp_stream::TcpStream;

/// A non-blocking TCP listener.
pub struct TcpListener {
    inner: mio::tcp::TcpListener,
}

impl TcpListener {
    pub fn bind(addr: SocketAddress) -> Result<Self> {
        let inner = mio::tcp::TcpListener::bind(&addr.std())?;
        Ok(TcpListener { inner })
    }

    /// Accepts one pending connection, if any.
    ///
    /// Returns `Ok(None)` rather than blocking when the kernel reports no
    /// pending connection.
    pub fn accept(&self) -> Result<Option<TcpStream>> {
        match self.inner.accept() {
            Ok((stream, _peer_addr)) => Ok(Some(TcpStream::from_mio(stream)?)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddress> {
        Ok(self.inner.local_addr()?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_without_a_pending_connection_returns_none() {
        let addr = SocketAddress::resolve("127.0.0.1", 0).unwrap();
        let listener = TcpListener::bind(addr).unwrap();
        assert!(listener.accept().unwrap().is_none());
    }

    #[test]
    fn binding_to_port_zero_picks_an_ephemeral_port() {
        let addr = SocketAddress::resolve("127.0.0.1", 0).unwrap();
        let listener = TcpListener::bind(addr).unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }
}
