//! Local host address discovery
//!
//! Endpoint selection needs the address this host uses for outbound traffic.
//! That is the source address the kernel picks for the default route, which
//! we learn by "connecting" a UDP socket: connect only consults the routing
//! table, no packet leaves the machine.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::debug;

use lattice_common::Error;

/// Destination used to ask the routing table for the IPv4 default route (TEST-NET-1)
const IPV4_ROUTE_TARGET: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 9);
/// Destination used to ask the routing table for the IPv6 default route (documentation prefix)
const IPV6_ROUTE_TARGET: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
    9,
);

/// Source of the local host's routable IP address
#[cfg_attr(test, mockall::automock)]
pub trait HostAddressSource: Send + Sync {
    /// Return the address this host uses to reach other networks
    fn host_ip(&self) -> Result<IpAddr, Error>;
}

/// Default implementation: source address of the default route
///
/// IPv4 is tried first; IPv6 is used on v6-only hosts.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRouteAddress;

impl HostAddressSource for DefaultRouteAddress {
    fn host_ip(&self) -> Result<IpAddr, Error> {
        let ip = first_routable_source(&[IPV4_ROUTE_TARGET, IPV6_ROUTE_TARGET])?;
        debug!(host_ip = %ip, "resolved host address from default route");
        Ok(ip)
    }
}

/// A fixed address, for hosts where the default route is not the right answer
#[derive(Clone, Copy, Debug)]
pub struct FixedHostAddress(pub IpAddr);

impl HostAddressSource for FixedHostAddress {
    fn host_ip(&self) -> Result<IpAddr, Error> {
        Ok(self.0)
    }
}

/// Source address of the first route target that yields a routable one
fn first_routable_source(targets: &[SocketAddr]) -> Result<IpAddr, Error> {
    let mut failures = Vec::with_capacity(targets.len());
    for target in targets {
        match route_source_address(*target) {
            Ok(ip) => return Ok(ip),
            Err(e) => failures.push(format!("{}: {}", target, e)),
        }
    }
    Err(Error::network(format!(
        "unable to determine host address from default route ({})",
        failures.join(", ")
    )))
}

fn route_source_address(target: SocketAddr) -> std::io::Result<IpAddr> {
    let bind: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind)?;
    socket.connect(target)?;
    let ip = socket.local_addr()?.ip();
    if ip.is_unspecified() || ip.is_loopback() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no routable source address (got {})", ip),
        ));
    }
    Ok(ip)
}
