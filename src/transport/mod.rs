//! Byte-stream transport handles
//!
//! The protocol layer reads and writes through `TransportOps` without
//! knowing whether TLS is active.
//!
//! # Architecture
//!
//! - `TransportOps` defines poll/read/write/flush/close
//! - `PlainTransport` implements it over a raw `TcpStream`
//! - `TlsTransport` implements it over an OpenSSL stream
//! - `Transport` is whichever of the two connection setup produced
//!
//! # Examples
//!
//! ```no_run
//! use wireprep::transport::{TransportOps, TransportSettings};
//! use wireprep::tls::TlsConfig;
//! use std::net::TcpStream;
//!
//! let settings = TransportSettings::new()
//!     .tcp_option("TCP_KEEPIDLE", 60)
//!     .tls(TlsConfig::Absent);
//!
//! let stream = TcpStream::connect("broker.example.com:5671").unwrap();
//! let mut transport = settings.prepare(stream).unwrap();
//! transport.write(b"AMQP\x00\x00\x09\x01").unwrap();
//! ```

pub mod plain;
pub mod setup;

pub use plain::PlainTransport;
pub use setup::TransportSettings;

use crate::tls::{TlsError, TlsTransport};
use std::net::TcpStream;
use std::os::fd::RawFd;
use std::time::Duration;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Operations the protocol layer needs from a connection
pub trait TransportOps {
    /// Poll for readiness
    ///
    /// Returns true if the transport is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the transport
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the transport
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered writes
    fn flush(&mut self) -> Result<()>;

    /// Close the transport
    fn close(&mut self) -> Result<()>;

    /// Write the whole buffer
    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

/// `poll(2)` on a single descriptor
pub(crate) fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    Ok(result > 0)
}

/// A prepared connection, plain or TLS
pub enum Transport {
    Plain(PlainTransport),
    Tls(TlsTransport),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Get reference to the underlying TCP stream
    pub fn tcp_stream(&self) -> &TcpStream {
        match self {
            Transport::Plain(t) => t.stream(),
            Transport::Tls(t) => t.get_ref(),
        }
    }

    pub fn as_tls(&self) -> Option<&TlsTransport> {
        match self {
            Transport::Tls(t) => Some(t),
            Transport::Plain(_) => None,
        }
    }

    pub fn as_tls_mut(&mut self) -> Option<&mut TlsTransport> {
        match self {
            Transport::Tls(t) => Some(t),
            Transport::Plain(_) => None,
        }
    }
}

impl From<PlainTransport> for Transport {
    fn from(t: PlainTransport) -> Self {
        Transport::Plain(t)
    }
}

impl From<TlsTransport> for Transport {
    fn from(t: TlsTransport) -> Self {
        Transport::Tls(t)
    }
}

impl TransportOps for Transport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        match self {
            Transport::Plain(t) => t.poll(events, timeout),
            Transport::Tls(t) => t.poll(events, timeout),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Transport::Plain(t) => t.read(buf),
            Transport::Tls(t) => t.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            Transport::Plain(t) => t.write(buf),
            Transport::Tls(t) => t.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(t) => t.flush(),
            Transport::Tls(t) => t.flush(),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Transport::Plain(t) => t.close(),
            Transport::Tls(t) => t.close(),
        }
    }
}
