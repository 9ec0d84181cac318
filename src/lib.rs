//! wireprep - transport preparation for messaging-protocol clients
//!
//! This crate takes a freshly connected TCP socket, tunes its keepalive
//! options and optionally upgrades it to TLS, handing back a byte-stream
//! transport for the protocol state machine.

pub mod net;
pub mod tls;
pub mod transport;

pub use transport::{Transport, TransportOps, TransportSettings};
