//! TLS upgrade of a connected socket
//!
//! This module turns a connected `TcpStream` into an encrypted transport
//! according to a `TlsConfig`.
//!
//! # Architecture
//!
//! 1. `TlsConfig` is one of `Absent`, `Legacy` (keyword arguments passed
//!    straight to the plain wrap primitive) or `Structured` (`TlsOptions`)
//! 2. `wrap_socket` dispatches on the variant and drives a `TlsBackend`
//! 3. `OpensslBackend` produces a `TlsTransport`, which implements
//!    `TransportOps` like the plain transport does
//!
//! # Examples
//!
//! ```no_run
//! use wireprep::tls::{wrap_socket, OpensslBackend, TlsConfig, TlsOptions};
//! use std::net::TcpStream;
//!
//! let options = TlsOptions::new()
//!     .ca_file("/etc/broker/ca.pem")
//!     .server_hostname("broker.example.com");
//!
//! let tcp_stream = TcpStream::connect("broker.example.com:5671").unwrap();
//! let transport = wrap_socket(&OpensslBackend, tcp_stream, &TlsConfig::Structured(options)).unwrap();
//! assert!(transport.is_handshake_complete());
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod context;
pub mod session;

pub use backend::{ContextParams, TlsBackend, TlsContext, WrapParams};
pub use builder::wrap_socket;
pub use config::{
    TlsConfig, TlsError, TlsOptions, TlsValue, TlsVersion, VerifyMode, WrapArgs, DO_HANDSHAKE,
    DO_HANDSHAKE_ARG,
};
pub use context::{OpensslBackend, OpensslContext};
pub use session::TlsTransport;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
