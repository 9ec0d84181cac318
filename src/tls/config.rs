//! TLS configuration
//!
//! A connection's TLS settings arrive in one of three shapes, resolved
//! before they reach this crate: nothing at all, a legacy keyword mapping
//! forwarded verbatim to the plain wrap primitive, or a structured options
//! record.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Keyword carrying the handshake-on-connect flag in wrap arguments
pub const DO_HANDSHAKE_ARG: &str = "do_handshake_on_connect";

/// Handshake-on-connect default used when the configuration says nothing
pub const DO_HANDSHAKE: bool = true;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" | "PROTOCOL_TLSV1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" | "PROTOCOL_TLSV1_1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" | "PROTOCOL_TLSV1_2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// Peer certificate verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Don't verify the peer
    None,
    /// Verify a certificate if the peer sends one
    Optional,
    /// Require and verify a peer certificate
    #[default]
    Required,
}

impl VerifyMode {
    /// Parse from the `CERT_*` names or their numeric values 0, 1, 2
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "CERT_NONE" | "NONE" | "0" => Ok(VerifyMode::None),
            "CERT_OPTIONAL" | "OPTIONAL" | "1" => Ok(VerifyMode::Optional),
            "CERT_REQUIRED" | "REQUIRED" | "2" => Ok(VerifyMode::Required),
            _ => Err(TlsError::InvalidConfig(format!("Invalid verify mode: {}", s))),
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown wrap argument: {0}")]
    UnknownArgument(String),

    #[error("Invalid value for wrap argument {key}: expected {expected}")]
    InvalidArgument { key: String, expected: &'static str },

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(openssl::ssl::Error),

    #[error("TLS session error: {0}")]
    Session(openssl::ssl::Error),
}

/// A value in a legacy wrap-argument mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl TlsValue {
    pub fn as_bool(&self, key: &str) -> Result<bool, TlsError> {
        match self {
            TlsValue::Bool(b) => Ok(*b),
            TlsValue::Int(i) => Ok(*i != 0),
            TlsValue::Str(_) => Err(TlsError::InvalidArgument {
                key: key.to_string(),
                expected: "a boolean",
            }),
        }
    }

    pub fn as_str(&self, key: &str) -> Result<&str, TlsError> {
        match self {
            TlsValue::Str(s) => Ok(s),
            _ => Err(TlsError::InvalidArgument {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    pub fn as_path(&self, key: &str) -> Result<&Path, TlsError> {
        self.as_str(key).map(Path::new)
    }
}

impl fmt::Display for TlsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsValue::Bool(b) => write!(f, "{}", b),
            TlsValue::Int(i) => write!(f, "{}", i),
            TlsValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for TlsValue {
    fn from(b: bool) -> Self {
        TlsValue::Bool(b)
    }
}

impl From<i64> for TlsValue {
    fn from(i: i64) -> Self {
        TlsValue::Int(i)
    }
}

impl From<&str> for TlsValue {
    fn from(s: &str) -> Self {
        TlsValue::Str(s.to_string())
    }
}

impl From<String> for TlsValue {
    fn from(s: String) -> Self {
        TlsValue::Str(s)
    }
}

/// Keyword arguments for the plain wrap primitive
pub type WrapArgs = BTreeMap<String, TlsValue>;

/// Structured TLS options
///
/// Certificate and CA fields are independently optional; `None` and an
/// empty value both mean "don't load this".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub key_password: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
    /// Inline CA certificates, PEM (one or more) or a single DER blob
    pub ca_data: Option<Vec<u8>>,
    /// Cipher list; `None` selects the backend's default policy
    pub ciphers: Option<String>,
    pub server_hostname: Option<String>,
    /// Minimum protocol version
    pub ssl_version: TlsVersion,
    pub verify_mode: VerifyMode,
    pub do_handshake_on_connect: bool,
    pub suppress_ragged_eofs: bool,
    pub server_side: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        TlsOptions {
            cert_file: None,
            key_file: None,
            key_password: None,
            ca_file: None,
            ca_path: None,
            ca_data: None,
            ciphers: None,
            server_hostname: None,
            ssl_version: TlsVersion::Tls12,
            verify_mode: VerifyMode::Required,
            do_handshake_on_connect: DO_HANDSHAKE,
            suppress_ragged_eofs: true,
            server_side: false,
        }
    }
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn key_password(mut self, password: impl Into<String>) -> Self {
        self.key_password = Some(password.into());
        self
    }

    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    pub fn ca_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.ca_data = Some(data.into());
        self
    }

    pub fn ciphers(mut self, ciphers: impl Into<String>) -> Self {
        self.ciphers = Some(ciphers.into());
        self
    }

    pub fn server_hostname(mut self, name: impl Into<String>) -> Self {
        self.server_hostname = Some(name.into());
        self
    }

    pub fn ssl_version(mut self, version: TlsVersion) -> Self {
        self.ssl_version = version;
        self
    }

    pub fn verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    pub fn do_handshake_on_connect(mut self, handshake: bool) -> Self {
        self.do_handshake_on_connect = handshake;
        self
    }

    pub fn suppress_ragged_eofs(mut self, suppress: bool) -> Self {
        self.suppress_ragged_eofs = suppress;
        self
    }

    pub fn server_side(mut self, server_side: bool) -> Self {
        self.server_side = server_side;
        self
    }

    pub(crate) fn cert_file_opt(&self) -> Option<&Path> {
        present_path(&self.cert_file)
    }

    pub(crate) fn key_file_opt(&self) -> Option<&Path> {
        present_path(&self.key_file)
    }

    pub(crate) fn key_password_opt(&self) -> Option<&str> {
        self.key_password.as_deref().filter(|p| !p.is_empty())
    }

    pub(crate) fn ca_file_opt(&self) -> Option<&Path> {
        present_path(&self.ca_file)
    }

    pub(crate) fn ca_path_opt(&self) -> Option<&Path> {
        present_path(&self.ca_path)
    }

    pub(crate) fn ca_data_opt(&self) -> Option<&[u8]> {
        self.ca_data.as_deref().filter(|d| !d.is_empty())
    }
}

fn present_path(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

/// TLS configuration, resolved to exactly one shape
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsConfig {
    /// No options: plain wrap with defaults
    #[default]
    Absent,
    /// Keyword arguments forwarded verbatim to the plain wrap primitive
    Legacy(WrapArgs),
    /// Validated options record with secure-context construction
    Structured(TlsOptions),
}

impl TlsConfig {
    /// Build a legacy mapping from key/value pairs
    pub fn legacy<I, K, V>(args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TlsValue>,
    {
        TlsConfig::Legacy(
            args.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<TlsOptions> for TlsConfig {
    fn from(options: TlsOptions) -> Self {
        TlsConfig::Structured(options)
    }
}
