use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::errors::SelectorError;

/// Resolved backend address: `host:port` TCP, or a Unix-domain socket path
/// for labels containing a `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ServerAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl ServerAddr {
    /// Resolves a server label into a concrete address.
    ///
    /// Name resolution happens here, once, at ring construction time. A label
    /// that does not resolve fails the whole build.
    pub(crate) fn resolve(label: &str) -> Result<Self, SelectorError> {
        if label.contains('/') {
            return Ok(ServerAddr::Unix(PathBuf::from(label)));
        }

        let mut addrs = label.to_socket_addrs().map_err(|source| SelectorError::Resolve {
            label: label.to_owned(),
            source,
        })?;

        match addrs.next() {
            Some(addr) => Ok(ServerAddr::Tcp(addr)),
            None => Err(SelectorError::Resolve {
                label: label.to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "label resolved to no addresses"),
            }),
        }
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Tcp(addr) => addr.fmt(f),
            ServerAddr::Unix(path) => path.display().fmt(f),
        }
    }
}
