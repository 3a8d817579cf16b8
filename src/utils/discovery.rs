//! Seam for locating the remote peer before any protocol traffic. The platform tooling that
//! scans and joins a Wi-Fi network lives outside this crate and plugs in through [`PeerLocator`].
use std::io;
use std::net::SocketAddr;

pub trait PeerLocator {
    /// Return a reachable `(ip, port)` for the peer behind `interface`.
    fn locate(&self, interface: &str) -> io::Result<(String, u16)>;
}

/// Locator that always answers with a fixed address.
#[derive(Debug, Clone)]
pub struct StaticLocator {
    ip: String,
    port: u16,
}

impl StaticLocator {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl From<SocketAddr> for StaticLocator {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl PeerLocator for StaticLocator {
    fn locate(&self, interface: &str) -> io::Result<(String, u16)> {
        log::debug!("Peer behind '{interface}' is {}:{}", self.ip, self.port);
        Ok((self.ip.clone(), self.port))
    }
}
