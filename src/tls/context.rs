//! OpenSSL backend
//!
//! Two ways into a TLS session:
//!
//! - the plain wrap primitive interprets keyword arguments itself and
//!   defaults to no peer verification
//! - a secure context is built with verification on, configured step by
//!   step, then used to wrap the socket

use super::backend::{ContextParams, TlsBackend, TlsContext, WrapParams};
use super::config::{TlsError, TlsVersion, VerifyMode, WrapArgs, DO_HANDSHAKE};
use super::session::TlsTransport;
use openssl::pkey::PKey;
use openssl::ssl::{HandshakeError, Ssl, SslContextBuilder, SslFiletype, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509;
use std::net::TcpStream;
use std::path::Path;

/// Cipher policy used when none is configured
pub const DEFAULT_CIPHERS: &str = "DEFAULT";

/// TLS backend over the system OpenSSL
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslBackend;

impl OpensslBackend {
    pub fn new() -> Self {
        OpensslBackend
    }
}

impl TlsBackend for OpensslBackend {
    type Stream = TlsTransport;
    type Context = OpensslContext;

    fn wrap_socket(&self, sock: TcpStream, args: &WrapArgs) -> Result<TlsTransport, TlsError> {
        let legacy = LegacyArgs::parse(args)?;

        let mut ctx = OpensslContext::with_verify(legacy.ssl_version, legacy.cert_reqs, false)?;

        // A legacy protocol selects exactly one version
        if let Some(version) = legacy.ssl_version {
            ctx.builder
                .set_max_proto_version(Some(version.to_openssl_version()))?;
        }

        if let Some(ciphers) = legacy.ciphers {
            ctx.set_ciphers(Some(ciphers))?;
        }

        if let Some(cert_file) = legacy.certfile {
            ctx.load_cert_chain(cert_file, legacy.keyfile, None)?;
        }

        if let Some(ca_certs) = legacy.ca_certs {
            ctx.load_verify_locations(Some(ca_certs), None, None)?;
        }

        ctx.wrap_socket(
            sock,
            &WrapParams {
                server_side: legacy.server_side,
                do_handshake_on_connect: legacy.do_handshake_on_connect,
                suppress_ragged_eofs: legacy.suppress_ragged_eofs,
                server_hostname: None,
            },
        )
    }

    fn create_context(&self, params: &ContextParams) -> Result<OpensslContext, TlsError> {
        OpensslContext::with_verify(Some(params.min_version), params.verify_mode, true)
    }
}

/// Keyword arguments understood by the plain wrap primitive
struct LegacyArgs<'a> {
    server_side: bool,
    do_handshake_on_connect: bool,
    suppress_ragged_eofs: bool,
    certfile: Option<&'a Path>,
    keyfile: Option<&'a Path>,
    ca_certs: Option<&'a Path>,
    cert_reqs: VerifyMode,
    ssl_version: Option<TlsVersion>,
    ciphers: Option<&'a str>,
}

impl<'a> LegacyArgs<'a> {
    fn parse(args: &'a WrapArgs) -> Result<Self, TlsError> {
        use super::config::TlsValue;

        let mut legacy = LegacyArgs {
            server_side: false,
            do_handshake_on_connect: DO_HANDSHAKE,
            suppress_ragged_eofs: true,
            certfile: None,
            keyfile: None,
            ca_certs: None,
            cert_reqs: VerifyMode::None,
            ssl_version: None,
            ciphers: None,
        };

        for (key, value) in args {
            let key = key.as_str();
            match key {
                "server_side" => legacy.server_side = value.as_bool(key)?,
                "do_handshake_on_connect" => legacy.do_handshake_on_connect = value.as_bool(key)?,
                "suppress_ragged_eofs" => legacy.suppress_ragged_eofs = value.as_bool(key)?,
                "certfile" => legacy.certfile = Some(value.as_path(key)?),
                "keyfile" => legacy.keyfile = Some(value.as_path(key)?),
                "ca_certs" => legacy.ca_certs = Some(value.as_path(key)?),
                "ciphers" => legacy.ciphers = Some(value.as_str(key)?),
                "ssl_version" => legacy.ssl_version = Some(TlsVersion::from_str(value.as_str(key)?)?),
                "cert_reqs" => {
                    legacy.cert_reqs = match value {
                        TlsValue::Int(i) => VerifyMode::from_str(&i.to_string())?,
                        TlsValue::Str(s) => VerifyMode::from_str(s)?,
                        TlsValue::Bool(_) => {
                            return Err(TlsError::InvalidArgument {
                                key: key.to_string(),
                                expected: "a verify mode",
                            })
                        }
                    }
                }
                other => return Err(TlsError::UnknownArgument(other.to_string())),
            }
        }

        if legacy.keyfile.is_some() && legacy.certfile.is_none() {
            return Err(TlsError::InvalidConfig("keyfile requires certfile".to_string()));
        }

        Ok(legacy)
    }
}

/// OpenSSL context under construction
pub struct OpensslContext {
    builder: SslContextBuilder,
}

impl OpensslContext {
    fn with_verify(
        min_version: Option<TlsVersion>,
        verify_mode: VerifyMode,
        default_trust: bool,
    ) -> Result<Self, TlsError> {
        let mut builder = SslContextBuilder::new(SslMethod::tls())?;

        if let Some(version) = min_version {
            builder.set_min_proto_version(Some(version.to_openssl_version()))?;
        }

        let mode = match verify_mode {
            VerifyMode::None => SslVerifyMode::NONE,
            VerifyMode::Optional => SslVerifyMode::PEER,
            VerifyMode::Required => SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT,
        };
        builder.set_verify(mode);

        if default_trust && verify_mode != VerifyMode::None {
            builder.set_default_verify_paths()?;
        }

        Ok(OpensslContext { builder })
    }
}

impl TlsContext for OpensslContext {
    type Stream = TlsTransport;

    fn set_ciphers(&mut self, ciphers: Option<&str>) -> Result<(), TlsError> {
        let ciphers = ciphers.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CIPHERS);
        self.builder.set_cipher_list(ciphers)?;
        Ok(())
    }

    fn load_cert_chain(
        &mut self,
        cert_file: &Path,
        key_file: Option<&Path>,
        password: Option<&str>,
    ) -> Result<(), TlsError> {
        self.builder.set_certificate_chain_file(cert_file)?;

        // Key may live in the certificate file
        let key_file = key_file.unwrap_or(cert_file);

        match password {
            Some(password) => {
                let pem = std::fs::read(key_file)?;
                let key = PKey::private_key_from_pem_passphrase(&pem, password.as_bytes())
                    .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
                self.builder.set_private_key(&key)?;
            }
            None => self.builder.set_private_key_file(key_file, SslFiletype::PEM)?,
        }

        self.builder
            .check_private_key()
            .map_err(|e| TlsError::Certificate(format!("Private key does not match certificate: {}", e)))?;

        Ok(())
    }

    fn load_verify_locations(
        &mut self,
        ca_file: Option<&Path>,
        ca_path: Option<&Path>,
        ca_data: Option<&[u8]>,
    ) -> Result<(), TlsError> {
        if ca_file.is_some() || ca_path.is_some() {
            self.builder.load_verify_locations(ca_file, ca_path)?;
        }

        if let Some(data) = ca_data {
            for cert in parse_ca_data(data)? {
                self.builder.cert_store_mut().add_cert(cert)?;
            }
        }

        Ok(())
    }

    fn wrap_socket(self, sock: TcpStream, params: &WrapParams<'_>) -> Result<TlsTransport, TlsError> {
        let ctx = self.builder.build();
        let mut ssl = Ssl::new(&ctx)?;

        if let Some(hostname) = params.server_hostname {
            if params.server_side {
                return Err(TlsError::InvalidConfig(
                    "server_hostname can only be set on client connections".to_string(),
                ));
            }
            ssl.set_hostname(hostname)?;
            ssl.param_mut().set_host(hostname)?;
        }

        let stream = if params.do_handshake_on_connect {
            let result = if params.server_side {
                ssl.accept(sock)
            } else {
                ssl.connect(sock)
            };
            result.map_err(handshake_error)?
        } else {
            if params.server_side {
                ssl.set_accept_state();
            } else {
                ssl.set_connect_state();
            }
            SslStream::new(ssl, sock)?
        };

        Ok(TlsTransport::new(stream, params.suppress_ragged_eofs))
    }
}

/// PEM bundle (one or more certificates) or a single DER certificate
fn parse_ca_data(data: &[u8]) -> Result<Vec<X509>, TlsError> {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let certs = if data[start..].starts_with(b"-----BEGIN") {
        X509::stack_from_pem(data)?
    } else {
        vec![X509::from_der(data)?]
    };

    if certs.is_empty() {
        return Err(TlsError::Certificate("No certificates found in CA data".to_string()));
    }

    Ok(certs)
}

fn handshake_error(err: HandshakeError<TcpStream>) -> TlsError {
    match err {
        HandshakeError::SetupFailure(stack) => TlsError::OpenSsl(stack),
        HandshakeError::Failure(mid) | HandshakeError::WouldBlock(mid) => {
            TlsError::HandshakeFailed(mid.into_error())
        }
    }
}
