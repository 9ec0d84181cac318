//! Platform socket-option capabilities
//!
//! Which TCP options exist is a property of the target platform, so the
//! table is derived from the `libc` constants compiled in for it. Tests and
//! embedders can build their own table instead of relying on the platform
//! one.

use libc::c_int;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Protocol level a socket option lives at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionLevel {
    /// `SOL_SOCKET`
    Socket,
    /// `IPPROTO_TCP`
    Tcp,
}

impl OptionLevel {
    /// Raw level passed to `setsockopt`
    pub fn as_raw(&self) -> c_int {
        match self {
            OptionLevel::Socket => libc::SOL_SOCKET,
            OptionLevel::Tcp => libc::IPPROTO_TCP,
        }
    }
}

/// A resolved socket option: protocol level plus OS constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketOption {
    pub level: OptionLevel,
    pub name: c_int,
}

impl SocketOption {
    /// `SO_KEEPALIVE`, enabled before any keepalive tuning
    pub const KEEPALIVE: SocketOption = SocketOption {
        level: OptionLevel::Socket,
        name: libc::SO_KEEPALIVE,
    };

    pub const fn tcp(name: c_int) -> Self {
        SocketOption {
            level: OptionLevel::Tcp,
            name,
        }
    }
}

/// Immutable registry of option names the platform supports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionCapabilityTable {
    options: HashMap<String, SocketOption>,
}

static PLATFORM: OnceLock<OptionCapabilityTable> = OnceLock::new();

impl OptionCapabilityTable {
    /// Create an empty table (nothing resolves)
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for the running platform, probed on first use
    pub fn platform() -> &'static OptionCapabilityTable {
        PLATFORM.get_or_init(Self::probe)
    }

    /// Build a fresh table from the constants this target exposes
    pub fn probe() -> Self {
        let table = Self::new();

        #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
        let table = table
            .with("TCP_KEEPIDLE", OptionLevel::Tcp, libc::TCP_KEEPIDLE)
            .with("TCP_KEEPINTVL", OptionLevel::Tcp, libc::TCP_KEEPINTVL)
            .with("TCP_KEEPCNT", OptionLevel::Tcp, libc::TCP_KEEPCNT);

        #[cfg(any(target_os = "linux", target_os = "android"))]
        let table = table.with("TCP_USER_TIMEOUT", OptionLevel::Tcp, libc::TCP_USER_TIMEOUT);

        // Darwin names the idle timer TCP_KEEPALIVE
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        let table = table
            .with("TCP_KEEPIDLE", OptionLevel::Tcp, libc::TCP_KEEPALIVE)
            .with("TCP_KEEPINTVL", OptionLevel::Tcp, libc::TCP_KEEPINTVL)
            .with("TCP_KEEPCNT", OptionLevel::Tcp, libc::TCP_KEEPCNT);

        table
    }

    /// Add (or replace) an entry
    pub fn with(mut self, name: impl Into<String>, level: OptionLevel, constant: c_int) -> Self {
        self.options.insert(
            name.into(),
            SocketOption {
                level,
                name: constant,
            },
        );
        self
    }

    /// Look up an option by name
    pub fn resolve(&self, name: &str) -> Option<SocketOption> {
        self.options.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Names known to this table, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, SocketOption)> for OptionCapabilityTable {
    fn from_iter<I: IntoIterator<Item = (S, SocketOption)>>(iter: I) -> Self {
        OptionCapabilityTable {
            options: iter.into_iter().map(|(name, opt)| (name.into(), opt)).collect(),
        }
    }
}
