//! Registry address resolution.
//!
//! Service advertisement and multicast resolution live outside ledmesh; nodes
//! only see a [`Resolver`] that yields candidate addresses.

use std::net::{IpAddr, SocketAddr};

/// Produces the candidate addresses a node should dial, in preference order.
pub trait Resolver: Send + Sync {
    fn resolve(&self) -> Vec<SocketAddr>;
}

/// A fixed list of addresses, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().collect(),
        }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self) -> Vec<SocketAddr> {
        self.addrs.clone()
    }
}

impl<F> Resolver for F
where
    F: Fn() -> Vec<SocketAddr> + Send + Sync,
{
    fn resolve(&self) -> Vec<SocketAddr> {
        self()
    }
}

/// Returns true for loopback, RFC 1918, link-local and IPv6 unique-local addresses.
pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Keep only addresses in private network ranges.
pub fn private_only(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .filter(|addr| is_private(addr.ip()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_private_ranges() {
        for ip in [
            "10.1.2.3",
            "172.16.0.9",
            "192.168.1.20",
            "127.0.0.1",
            "169.254.3.3",
            "::1",
            "fd00::1",
            "fe80::1",
        ] {
            assert!(is_private(ip.parse().unwrap()), "{ip} should be private");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "2001:db8::1"] {
            assert!(!is_private(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[test]
    fn private_only_filters_and_keeps_order() {
        let addrs: Vec<SocketAddr> = vec![
            "8.8.8.8:2110".parse().unwrap(),
            "192.168.1.5:2110".parse().unwrap(),
            "10.0.0.2:2110".parse().unwrap(),
        ];
        let filtered = private_only(addrs);
        assert_eq!(
            filtered,
            vec![
                "192.168.1.5:2110".parse::<SocketAddr>().unwrap(),
                "10.0.0.2:2110".parse().unwrap()
            ]
        );
    }

    #[test]
    fn closures_act_as_resolvers() {
        let resolver = || vec!["127.0.0.1:9".parse::<SocketAddr>().unwrap()];
        assert_eq!(resolver.resolve().len(), 1);
    }
}
