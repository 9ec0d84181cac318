//! TLS transport construction
//!
//! Dispatches on the `TlsConfig` variant and drives the backend's
//! primitives in a fixed order. Nothing here inspects the contents of a
//! legacy mapping, and no error is retried or softened.

use super::backend::{ContextParams, TlsBackend, TlsContext, WrapParams};
use super::config::{TlsConfig, TlsError, TlsOptions, TlsValue, WrapArgs, DO_HANDSHAKE, DO_HANDSHAKE_ARG};
use std::net::TcpStream;

/// Upgrade a connected socket according to `config`
///
/// The socket is consumed; on success the returned stream owns it.
pub fn wrap_socket<B: TlsBackend>(
    backend: &B,
    sock: TcpStream,
    config: &TlsConfig,
) -> Result<B::Stream, TlsError> {
    match config {
        TlsConfig::Absent => {
            tracing::debug!("wrapping socket with default TLS settings");
            backend.wrap_socket(sock, &legacy_args(None))
        }
        TlsConfig::Legacy(mapping) => {
            tracing::debug!(keys = mapping.len(), "wrapping socket with legacy TLS arguments");
            backend.wrap_socket(sock, &legacy_args(Some(mapping)))
        }
        TlsConfig::Structured(options) => wrap_structured(backend, sock, options),
    }
}

/// Handshake default overlaid by the caller's mapping
fn legacy_args(mapping: Option<&WrapArgs>) -> WrapArgs {
    let mut args = WrapArgs::new();
    args.insert(DO_HANDSHAKE_ARG.to_string(), TlsValue::Bool(DO_HANDSHAKE));

    if let Some(mapping) = mapping {
        args.extend(mapping.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    args
}

fn wrap_structured<B: TlsBackend>(
    backend: &B,
    sock: TcpStream,
    options: &TlsOptions,
) -> Result<B::Stream, TlsError> {
    tracing::debug!(
        server_side = options.server_side,
        hostname = options.server_hostname.as_deref(),
        "wrapping socket with structured TLS options"
    );

    let mut ctx = backend.create_context(&ContextParams {
        min_version: options.ssl_version,
        verify_mode: options.verify_mode,
    })?;

    // Always called: an unset list must still select the default policy
    ctx.set_ciphers(options.ciphers.as_deref())?;

    if let Some(cert_file) = options.cert_file_opt() {
        ctx.load_cert_chain(cert_file, options.key_file_opt(), options.key_password_opt())?;
    }

    let ca_file = options.ca_file_opt();
    let ca_path = options.ca_path_opt();
    let ca_data = options.ca_data_opt();
    if ca_file.is_some() || ca_path.is_some() || ca_data.is_some() {
        ctx.load_verify_locations(ca_file, ca_path, ca_data)?;
    }

    ctx.wrap_socket(
        sock,
        &WrapParams {
            server_side: options.server_side,
            do_handshake_on_connect: options.do_handshake_on_connect,
            suppress_ragged_eofs: options.suppress_ragged_eofs,
            server_hostname: options.server_hostname.as_deref(),
        },
    )
}
