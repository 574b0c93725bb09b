use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::utils::error::ConfigurationError;

/// Validated IP address and port (1-65535).
///
/// Immutable once built; two endpoints are equal when address and port are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    /// Parse an IPv4/IPv6 address string and pair it with `port`.
    pub fn new(ip_address: &str, port: u16) -> Result<Self, ConfigurationError> {
        let ip: IpAddr = ip_address
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidAddress(ip_address.to_string()))?;
        Self::from_parts(ip, port)
    }

    /// Like [`Endpoint::new`] but takes the port as read from a settings file,
    /// where it may be out of the `u16` range.
    pub fn parse(ip_address: &str, port: i64) -> Result<Self, ConfigurationError> {
        let port = u16::try_from(port).map_err(|_| ConfigurationError::InvalidPort(port))?;
        Self::new(ip_address, port)
    }

    pub fn from_parts(ip: IpAddr, port: u16) -> Result<Self, ConfigurationError> {
        if port == 0 {
            return Err(ConfigurationError::InvalidPort(0));
        }
        Ok(Self {
            addr: SocketAddr::new(ip, port),
        })
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wildcard address of the same family with an OS-assigned port, used by
    /// a session that talks to this endpoint without binding a known port.
    pub fn wildcard_for(&self) -> SocketAddr {
        match self.addr {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }
}

impl TryFrom<SocketAddr> for Endpoint {
    type Error = ConfigurationError;

    fn try_from(addr: SocketAddr) -> Result<Self, Self::Error> {
        Self::from_parts(addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.addr
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}
