//! Socket-level preparation
//!
//! This module tunes a freshly connected TCP socket before any protocol
//! traffic flows over it.
//!
//! # Architecture
//!
//! - `OptionCapabilityTable` maps option names to the OS constants the
//!   running platform exposes. It is built once and never mutated.
//! - `apply_tcp_options` walks a `TcpOptions` map, resolves each name
//!   through the table and issues `setsockopt` calls on the socket.
//!
//! Names the platform does not know are skipped silently, so the same
//! configuration can be shipped to every platform.
//!
//! # Examples
//!
//! ```no_run
//! use wireprep::net::{set_sock_opts, TcpOptions};
//! use std::net::TcpStream;
//!
//! let options: TcpOptions = "TCP_KEEPIDLE=60,TCP_KEEPINTVL=10".parse().unwrap();
//! let stream = TcpStream::connect("127.0.0.1:5672").unwrap();
//! set_sock_opts(Some(&options), &stream).unwrap();
//! ```

pub mod capability;
pub mod sockopt;

pub use capability::{OptionCapabilityTable, OptionLevel, SocketOption};
pub use sockopt::{apply_tcp_options, set_sock_opts, SetSockOpt, TcpOptions};

/// Result type for option parsing
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing TCP option maps
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid TCP option: {0}")]
    InvalidOption(String),

    #[error("Invalid value for TCP option {name}: {value}")]
    InvalidValue { name: String, value: String },
}
