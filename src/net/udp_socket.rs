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

const MAX_DATAGRAM: usize = 65_507;

/// A non-blocking UDP socket.
pub struct UdpSocket {
    inner: mio::udp::UdpSocket,
}

impl UdpSocket {
    pub fn bind(addr: SocketAddress) -> Result<Self> {
        let inner = mio::udp::UdpSocket::bind(&addr.std())?;
        Ok(UdpSocket { inner })
    }

    /// Receives one datagram, if any is waiting. Returns `Ok(None)` rather
    /// than blocking when the kernel has nothing queued.
    pub fn recv_from(&self) -> Result<Option<(Vec<u8>, SocketAddress)>> {
        let mut buf = [0u8; MAX_DATAGRAM];
        match self.inner.recv_from(&mut buf) {
            Ok(Some((n, from))) => Ok(Some((buf[..n].to_vec(), from.into()))),
            Ok(None) => Ok(None),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Sends one datagram. A `WouldBlock` on send is treated as a dropped
    /// packet (consistent with UDP's unreliable-delivery contract) rather
    /// than an error.
    pub fn send_to(&self, bytes: &[u8], to: SocketAddress) -> Result<()> {
        match self.inner.send_to(bytes, &to.std()) {
            Ok(_) => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
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
    fn recv_without_a_pending_datagram_returns_none() {
        let socket = UdpSocket::bind(SocketAddress::resolve("127.0.0.1", 0).unwrap()).unwrap();
        assert!(socket.recv_from().unwrap().is_none());
    }

    #[test]
    fn send_then_recv_round_trips_loopback() {
        let a = UdpSocket::bind(SocketAddress::resolve("127.0.0.1", 0).unwrap()).unwrap();
        let b = UdpSocket::bind(SocketAddress::resolve("127.0.0.1", 0).unwrap()).unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).unwrap();

        let mut received = None;
        for _ in 0..1000 {
            if let Some(pair) = b.recv_from().unwrap() {
                received = Some(pair);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let (data, from) = received.expect("datagram should arrive over loopback");
        assert_eq!(data, b"ping");
        assert_eq!(from.port(), a.local_addr().unwrap().port());
    }
}
