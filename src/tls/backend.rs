//! TLS primitives
//!
//! The wrap logic only talks to a TLS library through these two traits,
//! which keeps the dispatch in `builder` independent of OpenSSL and lets
//! tests record the exact primitive calls a configuration produces.

use super::config::{TlsError, TlsVersion, VerifyMode, WrapArgs};
use std::net::TcpStream;
use std::path::Path;

/// Parameters fixed when a secure context is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextParams {
    pub min_version: TlsVersion,
    pub verify_mode: VerifyMode,
}

/// Per-connection parameters of a context wrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapParams<'a> {
    pub server_side: bool,
    pub do_handshake_on_connect: bool,
    pub suppress_ragged_eofs: bool,
    pub server_hostname: Option<&'a str>,
}

/// A TLS library
pub trait TlsBackend {
    /// Handle produced by a successful wrap
    type Stream;

    /// Secure context type
    type Context: TlsContext<Stream = Self::Stream>;

    /// Plain wrap primitive: every argument is interpreted by the backend
    fn wrap_socket(&self, sock: TcpStream, args: &WrapArgs) -> Result<Self::Stream, TlsError>;

    /// Construct a secure context with the library's protocol defaults
    fn create_context(&self, params: &ContextParams) -> Result<Self::Context, TlsError>;
}

/// A configurable TLS context
pub trait TlsContext {
    type Stream;

    /// Select ciphers; `None` picks the library's default policy
    fn set_ciphers(&mut self, ciphers: Option<&str>) -> Result<(), TlsError>;

    /// Load our certificate chain and private key
    fn load_cert_chain(
        &mut self,
        cert_file: &Path,
        key_file: Option<&Path>,
        password: Option<&str>,
    ) -> Result<(), TlsError>;

    /// Load trust anchors used to verify the peer
    fn load_verify_locations(
        &mut self,
        ca_file: Option<&Path>,
        ca_path: Option<&Path>,
        ca_data: Option<&[u8]>,
    ) -> Result<(), TlsError>;

    /// Upgrade `sock`, consuming the context
    fn wrap_socket(self, sock: TcpStream, params: &WrapParams<'_>) -> Result<Self::Stream, TlsError>;
}
