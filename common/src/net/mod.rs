use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use ipnetwork::IpNetwork;
use log::{debug, warn};

#[cfg(target_os = "windows")]
mod win;

#[cfg(not(target_os = "windows"))]
mod rest;

/// An address assigned to a local interface together with its on-link prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddr {
    pub ip: IpAddr,
    pub prefix_len: u8,
}

impl LocalAddr {
    /// Whether `target` is on the same link as this address.
    pub fn contains(&self, target: IpAddr) -> bool {
        match IpNetwork::new(self.ip, self.prefix_len) {
            Ok(network) => network.contains(target),
            Err(_) => false,
        }
    }
}

pub fn get_all_ip_addresses() -> Vec<LocalAddr> {
    #[cfg(target_os = "windows")]
    {
        win::get_all_ip_addresses()
    }

    #[cfg(not(target_os = "windows"))]
    {
        rest::get_all_ip_addresses()
    }
}

/// Pick the address in `addrs` that shares a subnet with `target`.
///
/// Loopback addresses are only considered for a loopback target. When several
/// addresses qualify the first one is used.
pub fn select_local_ip(addrs: &[LocalAddr], target: IpAddr) -> Option<IpAddr> {
    let mut candidates = addrs
        .iter()
        .filter(|addr| addr.ip.is_ipv4() == target.is_ipv4())
        .filter(|addr| !addr.ip.is_loopback() || target.is_loopback())
        .filter(|addr| addr.contains(target))
        .map(|addr| addr.ip);

    let selected = candidates.next()?;
    let others = candidates.collect::<Vec<_>>();
    if !others.is_empty() {
        warn!("Several local addresses can reach {target}, using {selected} (ignoring {others:?})");
    }

    Some(selected)
}

/// Ask the routing table which local address would be used to reach `target`.
fn route_local_ip(target: IpAddr) -> Option<IpAddr> {
    let bind_addr = match target {
        IpAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        IpAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(bind_addr).ok()?;
    // Connecting a UDP socket sends nothing, it only resolves the route
    socket.connect(SocketAddr::new(target, 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

/// Find a local address the receiver at `target` can reach us on.
pub fn local_ip_for(target: IpAddr) -> Option<IpAddr> {
    if let Some(ip) = select_local_ip(&get_all_ip_addresses(), target) {
        debug!("Selected local address {ip} on the subnet of {target}");
        return Some(ip);
    }

    let ip = route_local_ip(target);
    debug!("No interface shares a subnet with {target}, routing table suggests {ip:?}");
    ip
}

/// Format `addr` for the host part of a URL.
pub fn addr_to_url_host(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(ipv4_addr) => ipv4_addr.to_string(),
        IpAddr::V6(ipv6_addr) => format!("[{ipv6_addr}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! local {
        ($ip:expr, $prefix:expr) => {
            LocalAddr {
                ip: $ip.parse().unwrap(),
                prefix_len: $prefix,
            }
        };
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn selects_address_on_target_subnet() {
        let addrs = [
            local!("127.0.0.1", 8),
            local!("10.8.0.2", 24),
            local!("192.168.1.20", 24),
            local!("fe80::1", 64),
        ];

        assert_eq!(
            select_local_ip(&addrs, ip("192.168.1.44")),
            Some(ip("192.168.1.20"))
        );
        assert_eq!(select_local_ip(&addrs, ip("10.8.0.1")), Some(ip("10.8.0.2")));
        assert_eq!(select_local_ip(&addrs, ip("fe80::abcd")), Some(ip("fe80::1")));
    }

    #[test]
    fn respects_prefix_length() {
        let addrs = [local!("10.0.0.5", 16)];
        assert_eq!(select_local_ip(&addrs, ip("10.0.200.1")), Some(ip("10.0.0.5")));
        assert_eq!(select_local_ip(&addrs, ip("10.1.0.1")), None);
    }

    #[test]
    fn loopback_only_for_loopback_targets() {
        let addrs = [local!("127.0.0.1", 8), local!("192.168.1.20", 24)];
        assert_eq!(select_local_ip(&addrs, ip("127.0.0.1")), Some(ip("127.0.0.1")));
        assert_eq!(select_local_ip(&addrs, ip("172.16.0.1")), None);
    }

    #[test]
    fn first_match_wins() {
        let addrs = [local!("192.168.1.20", 24), local!("192.168.1.21", 24)];
        assert_eq!(
            select_local_ip(&addrs, ip("192.168.1.1")),
            Some(ip("192.168.1.20"))
        );
    }

    #[test]
    fn url_host() {
        assert_eq!(addr_to_url_host(ip("10.0.0.5")), "10.0.0.5");
        assert_eq!(addr_to_url_host(ip("fe80::1")), "[fe80::1]");
    }
}
