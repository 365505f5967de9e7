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

use std::io::{self, Read, Write};

use socket2::{Domain, Socket, Type};

use crate::error::Result;
use crate::sockaddr::SocketAddress;

/// Per-tick read budget: drain until `EWOULDBLOCK`, capped at 64 KiB per
/// socket so one chatty peer can't starve the rest of the event loop.
const READ_BUDGET: usize = 64 * 1024;
const CHUNK: usize = 4096;

/// Outcome of draining whatever is currently readable from a stream.
pub struct ReadResult {
    pub data: Vec<u8>,
    /// Set once the peer has half-closed the connection (a `read` of
    /// length zero was observed after the socket was reported readable).
    pub closed: bool,
}

/// A non-blocking TCP stream.
pub struct TcpStream {
    inner: mio::tcp::TcpStream,
}

impl TcpStream {
    pub(super) fn from_mio(inner: mio::tcp::TcpStream) -> Result<Self> {
        inner.set_nodelay(true).ok();
        Ok(TcpStream { inner })
    }

    /// Connects to `remote`, optionally binding the local endpoint first.
    ///
    /// The connect itself is non-blocking: this returns as soon as the
    /// connection attempt has been submitted to the kernel. Binding a
    /// specific local address needs finer control
    /// than `mio::tcp::TcpStream::connect` exposes, so this goes through
    /// `socket2` first (the same crate `huginn-proxy` uses for low-level
    /// socket setup) and hands the resulting file descriptor to `mio`.
    pub fn connect(remote: SocketAddress, local: Option<SocketAddress>) -> Result<Self> {
        let domain = if remote.is_v6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_nonblocking(true)?;
        if let Some(local) = local {
            socket.bind(&local.std().into())?;
        }
        match socket.connect(&remote.std().into()) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(libc_eagain()) => {}
            Err(e) => return Err(e.into()),
        }
        let std_stream: std::net::TcpStream = socket.into();
        let inner = mio::tcp::TcpStream::from_stream(std_stream)?;
        Self::from_mio(inner)
    }

    /// Drains everything currently readable, up to the per-tick budget.
    pub fn read_available(&mut self) -> Result<ReadResult> {
        let mut data = Vec::new();
        let mut buf = [0u8; CHUNK];
        let mut closed = false;
        loop {
            if data.len() >= READ_BUDGET {
                break;
            }
            match self.inner.read(&mut buf) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReadResult { data, closed })
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn peer_addr(&self) -> Result<SocketAddress> {
        Ok(self.inner.peer_addr()?.into())
    }

    pub fn local_addr(&self) -> Result<SocketAddress> {
        Ok(self.inner.local_addr()?.into())
    }

    pub fn shutdown(&self) {
        let _ = self.inner.shutdown(std::net::Shutdown::Both);
    }
}

/// `EAGAIN` and `EWOULDBLOCK` are the same value on every platform this
/// crate targets; kept as a named helper rather than a raw literal.
fn libc_eagain() -> i32 {
    #[cfg(unix)]
    {
        nix_eagain()
    }
    #[cfg(not(unix))]
    {
        0
    }
}

#[cfg(unix)]
fn nix_eagain() -> i32 {
    // EAGAIN on Linux/macOS/BSD.
    11
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tcp_listener::TcpListener;

    #[test]
    fn connect_and_accept_loopback() {
        let listener = TcpListener::bind(SocketAddress::resolve("127.0.0.1", 0).unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr, None).unwrap();

        // Give the kernel a moment to complete the loopback handshake;
        // non-blocking accept may need a couple of attempts immediately
        // after connect() returns.
        let mut server = None;
        for _ in 0..1000 {
            if let Some(s) = listener.accept().unwrap() {
                server = Some(s);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let mut server = server.expect("listener should observe the pending connection");

        server.write_all(b"hello").unwrap();

        let mut result = client.read_available().unwrap();
        for _ in 0..1000 {
            if !result.data.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            result = client.read_available().unwrap();
        }
        assert_eq!(result.data, b"hello");
        assert!(!result.closed);
    }

    #[test]
    fn closed_peer_is_reported_as_closed() {
        let listener = TcpListener::bind(SocketAddress::resolve("127.0.0.1", 0).unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr, None).unwrap();

        let mut server = None;
        for _ in 0..1000 {
            if let Some(s) = listener.accept().unwrap() {
                server = Some(s);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let server = server.unwrap();
        drop(client);

        let mut server = server;
        let mut result = server.read_available().unwrap();
        for _ in 0..1000 {
            if result.closed {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            result = server.read_available().unwrap();
        }
        assert!(result.closed);
    }
}
