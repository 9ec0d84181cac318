//! TCP keepalive tuning
//!
//! Applies a declarative option map to a live socket. Keepalive itself is
//! switched on (`SO_KEEPALIVE = 1`) right before the first option that the
//! platform actually supports; a map with nothing supported issues no
//! system calls at all.

use super::capability::{OptionCapabilityTable, SocketOption};
use super::Error;
use libc::c_int;
use std::fmt;
use std::io;
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::str::FromStr;

/// Ordered map of TCP option names to integer values
///
/// Keys outside the known vocabulary are accepted; they are skipped when
/// applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpOptions {
    entries: Vec<(String, i32)>,
}

impl TcpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing a previous value for the same name
    pub fn insert(&mut self, name: impl Into<String>, value: i32) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style `insert`
    pub fn with(mut self, name: impl Into<String>, value: i32) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, i32)> for TcpOptions {
    fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
        let mut options = TcpOptions::new();
        for (name, value) in iter {
            options.insert(name, value);
        }
        options
    }
}

/// Parse `NAME=VALUE[,NAME=VALUE...]`
impl FromStr for TcpOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = TcpOptions::new();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::InvalidOption(pair.to_string()))?;

            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidOption(pair.to_string()));
            }

            let value = value.trim();
            let value = value.parse::<i32>().map_err(|_| Error::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            })?;

            options.insert(name, value);
        }

        Ok(options)
    }
}

impl fmt::Display for TcpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Anything that accepts raw integer `setsockopt` calls
pub trait SetSockOpt {
    fn set_raw_option(&self, option: SocketOption, value: c_int) -> io::Result<()>;
}

fn setsockopt_int(fd: RawFd, option: SocketOption, value: c_int) -> io::Result<()> {
    let result = unsafe {
        libc::setsockopt(
            fd,
            option.level.as_raw(),
            option.name,
            &value as *const c_int as *const libc::c_void,
            std::mem::size_of::<c_int>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

impl SetSockOpt for TcpStream {
    fn set_raw_option(&self, option: SocketOption, value: c_int) -> io::Result<()> {
        setsockopt_int(self.as_raw_fd(), option, value)
    }
}

impl SetSockOpt for socket2::Socket {
    fn set_raw_option(&self, option: SocketOption, value: c_int) -> io::Result<()> {
        setsockopt_int(self.as_raw_fd(), option, value)
    }
}

impl<T: SetSockOpt + ?Sized> SetSockOpt for &T {
    fn set_raw_option(&self, option: SocketOption, value: c_int) -> io::Result<()> {
        (**self).set_raw_option(option, value)
    }
}

/// Apply `options` to `socket`, resolving names through `table`
///
/// `None` and an empty map are both no-ops. The first resolvable option
/// triggers one `SO_KEEPALIVE = 1` call; unresolvable names are skipped.
/// An OS rejection is returned as-is and leaves later options unapplied.
pub fn apply_tcp_options<S>(
    options: Option<&TcpOptions>,
    socket: &S,
    table: &OptionCapabilityTable,
) -> io::Result<()>
where
    S: SetSockOpt + ?Sized,
{
    let options = match options {
        Some(options) if !options.is_empty() => options,
        _ => return Ok(()),
    };

    let mut keepalive_enabled = false;

    for (name, value) in options.iter() {
        let option = match table.resolve(name) {
            Some(option) => option,
            None => {
                tracing::trace!(option = name, "TCP option not supported on this platform, skipping");
                continue;
            }
        };

        if !keepalive_enabled {
            tracing::debug!("enabling TCP keepalive");
            socket.set_raw_option(SocketOption::KEEPALIVE, 1)?;
            keepalive_enabled = true;
        }

        tracing::debug!(option = name, value, "setting TCP option");
        socket.set_raw_option(option, value)?;
    }

    Ok(())
}

/// `apply_tcp_options` against the platform capability table
pub fn set_sock_opts<S>(options: Option<&TcpOptions>, socket: &S) -> io::Result<()>
where
    S: SetSockOpt + ?Sized,
{
    apply_tcp_options(options, socket, OptionCapabilityTable::platform())
}
