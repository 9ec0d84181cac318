//! TLS transport
//!
//! Implements `TransportOps` for an OpenSSL stream. The handshake is either
//! already complete when the transport is handed out, or deferred until
//! `do_handshake` (or the first read/write) runs it.

use super::config::TlsError;
use crate::transport::{poll_fd, Error, PollEvents, Result as TransportResult, TransportOps};
use openssl::ssl::{ErrorCode, SslStream};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Encrypted transport over a TCP stream
pub struct TlsTransport {
    stream: SslStream<TcpStream>,
    suppress_ragged_eofs: bool,
    failed: bool,
}

impl TlsTransport {
    pub(crate) fn new(stream: SslStream<TcpStream>, suppress_ragged_eofs: bool) -> Self {
        TlsTransport {
            stream,
            suppress_ragged_eofs,
            failed: false,
        }
    }

    /// Run a deferred handshake; a no-op once the handshake has completed
    pub fn do_handshake(&mut self) -> Result<(), TlsError> {
        if self.is_handshake_complete() {
            return Ok(());
        }

        self.stream.do_handshake().map_err(|e| {
            self.failed = true;
            TlsError::HandshakeFailed(e)
        })
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.stream.ssl().is_init_finished()
    }

    /// Negotiated protocol version (e.g., "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Negotiated cipher suite
    pub fn cipher(&self) -> Option<&'static str> {
        self.stream.ssl().current_cipher().map(|c| c.name())
    }

    pub fn suppresses_ragged_eofs(&self) -> bool {
        self.suppress_ragged_eofs
    }

    /// Check if TLS failed
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Get mutable reference to underlying TCP stream
    pub fn get_mut(&mut self) -> &mut TcpStream {
        self.stream.get_mut()
    }

    fn fail(&mut self, err: io::Error) -> Error {
        self.failed = true;
        Error::Io(err)
    }
}

/// Peer closed TCP without sending close_notify
fn is_ragged_eof(err: &openssl::ssl::Error) -> bool {
    match err.code() {
        ErrorCode::SYSCALL => err.io_error().is_none(),
        ErrorCode::SSL => err.ssl_error().map_or(false, |stack| {
            stack
                .errors()
                .iter()
                .any(|e| e.reason().map_or(false, |r| r.contains("unexpected eof")))
        }),
        _ => false,
    }
}

impl TransportOps for TlsTransport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> TransportResult<bool> {
        // Check if SSL has pending data
        if matches!(events, PollEvents::Read | PollEvents::Both) && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match self.stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.code() == ErrorCode::ZERO_RETURN => Ok(0),
            Err(e) if is_ragged_eof(&e) => {
                if self.suppress_ragged_eofs {
                    Ok(0)
                } else {
                    Err(self.fail(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "TLS peer closed the connection without close_notify",
                    )))
                }
            }
            Err(e) => match e.into_io_error() {
                Ok(io_err) => Err(self.fail(io_err)),
                Err(e) => {
                    self.failed = true;
                    Err(Error::Tls(TlsError::Session(e)))
                }
            },
        }
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        self.stream.write(buf).map_err(|e| self.fail(e))
    }

    fn flush(&mut self) -> TransportResult<()> {
        self.stream.flush().map_err(|e| self.fail(e))
    }

    fn close(&mut self) -> TransportResult<()> {
        // Best-effort close_notify; the TCP shutdown below is what matters
        if !self.failed && self.is_handshake_complete() {
            let _ = self.stream.shutdown();
        }

        self.stream
            .get_mut()
            .shutdown(Shutdown::Both)
            .map_err(Error::from)
    }
}
