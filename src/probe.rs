use std::net::{SocketAddr, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tracing::trace;

use crate::addr::ServerAddr;

/// Reachability check consulted before a candidate address is returned.
///
/// [`NetProbe`] is the default. Implement this to substitute protocol-aware
/// health checks, or canned results in tests.
pub trait Liveness {
    fn is_alive(&self, addr: &ServerAddr) -> bool;
}

/// Connect-and-close reachability probe.
///
/// A successful connect counts as alive; the connection is closed without
/// reading or writing, since cache servers never send unsolicited data and
/// any read would stall on a healthy connection. I/O errors fold into
/// "not alive" and never reach the caller. [`NetProbe::with_timeout`] bounds
/// the TCP connect so lookups stay bounded under partial network failure;
/// the default leaves the connect to the OS network stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetProbe {
    timeout: Option<Duration>,
}

impl NetProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        NetProbe { timeout: Some(timeout) }
    }

    fn dial(&self, addr: &SocketAddr) -> std::io::Result<TcpStream> {
        match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        }
    }
}

impl Liveness for NetProbe {
    fn is_alive(&self, addr: &ServerAddr) -> bool {
        let alive = match addr {
            ServerAddr::Tcp(socket) => self.dial(socket).is_ok(),
            #[cfg(unix)]
            ServerAddr::Unix(path) => UnixStream::connect(path).is_ok(),
            #[cfg(not(unix))]
            ServerAddr::Unix(_) => false,
        };

        if !alive {
            trace!(%addr, "liveness probe failed");
        }
        alive
    }
}
