//! Connection setup
//!
//! Runs the preparation steps in order on a freshly connected socket:
//! keepalive tuning first, then the optional TLS upgrade.

use super::{PlainTransport, Result, Transport};
use crate::net::{apply_tcp_options, OptionCapabilityTable, TcpOptions};
use crate::tls::{wrap_socket, OpensslBackend, TlsBackend, TlsConfig, TlsTransport};
use std::net::TcpStream;

/// Per-connection transport settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    /// Keepalive tuning; `None` leaves the socket untouched
    pub tcp_options: Option<TcpOptions>,
    /// TLS configuration; `None` keeps the connection in plaintext
    pub tls: Option<TlsConfig>,
}

impl TransportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single TCP option
    pub fn tcp_option(mut self, name: impl Into<String>, value: i32) -> Self {
        self.tcp_options
            .get_or_insert_with(TcpOptions::new)
            .insert(name, value);
        self
    }

    /// Replace the TCP option map
    pub fn tcp_options(mut self, options: TcpOptions) -> Self {
        self.tcp_options = Some(options);
        self
    }

    /// Enable TLS with the given configuration
    pub fn tls(mut self, config: impl Into<TlsConfig>) -> Self {
        self.tls = Some(config.into());
        self
    }

    /// Prepare `stream` using the platform option table and OpenSSL
    pub fn prepare(&self, stream: TcpStream) -> Result<Transport> {
        self.prepare_with(stream, OptionCapabilityTable::platform(), &OpensslBackend)
    }

    /// Prepare `stream` with an explicit option table and TLS backend
    pub fn prepare_with<B>(
        &self,
        stream: TcpStream,
        table: &OptionCapabilityTable,
        backend: &B,
    ) -> Result<Transport>
    where
        B: TlsBackend<Stream = TlsTransport>,
    {
        apply_tcp_options(self.tcp_options.as_ref(), &stream, table)?;

        match &self.tls {
            None => Ok(Transport::Plain(PlainTransport::new(stream))),
            Some(config) => Ok(Transport::Tls(wrap_socket(backend, stream, config)?)),
        }
    }
}
