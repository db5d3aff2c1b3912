use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{Error, Result};

/// The owned socket. A thin wrapper today (TCP only), kept separate from
/// `Transport` so the framing logic in `transport::mod` does not need to
/// know about `std::net` directly.
pub struct Stream {
    inner: TcpStream,
}

impl Stream {
    pub fn connect(host: &str, port: u16, connect_timeout: Option<Duration>) -> Result<Self> {
        use std::net::ToSocketAddrs;

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::ConnectionFailed)?
            .next()
            .ok_or(Error::ConnectionFailed)?;

        let inner = match connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)
                .map_err(|_| Error::ConnectionFailed)?,
            None => TcpStream::connect(addr).map_err(|_| Error::ConnectionFailed)?,
        };

        Ok(Self { inner })
    }

    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Error::Io)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Error::Io)
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Error::Io)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::ConnectionReset,
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::ReadTimeout,
            _ => Error::NetworkError(e.to_string()),
        })
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::WriteTimeout,
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                Error::ConnectionReset
            }
            _ => Error::NetworkError(e.to_string()),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|e| Error::NetworkError(e.to_string()))
    }
}
