//! Network range enumeration and local-subnet autodetection

use ipnetwork::Ipv4Network;
use pnet::datalink;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::{RadarError, Result};

/// Range used when autodetection finds no usable interface
pub const DEFAULT_NETWORK: &str = "192.168.1.0/24";

/// An IPv4 range to sweep, normalized to its network address.
///
/// Enumeration is lazy, ascending and restartable. For prefixes up to
/// /30 the network and broadcast addresses are excluded; a /31 yields
/// both addresses and a /32 yields the single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    network: Ipv4Network,
}

impl HostRange {
    /// Parse a CIDR spec. Host bits are masked off rather than rejected,
    /// so "192.168.1.57/24" selects 192.168.1.0/24.
    pub fn parse(spec: &str) -> Result<Self> {
        let parsed = Ipv4Network::from_str(spec.trim())
            .map_err(|e| RadarError::InvalidRange(format!("{}: {}", spec, e)))?;
        let network = Ipv4Network::new(parsed.network(), parsed.prefix())
            .map_err(|e| RadarError::InvalidRange(format!("{}: {}", spec, e)))?;
        Ok(Self { network })
    }

    /// The normalized network this range covers
    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    /// Number of addresses the iterator will yield
    pub fn len(&self) -> u64 {
        match self.network.prefix() {
            32 => 1,
            31 => 2,
            prefix => (1u64 << (32 - prefix)) - 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ascending iterator over the usable host addresses
    pub fn iter(&self) -> HostIter {
        let base = u32::from(self.network.network()) as u64;
        let (first, last) = match self.network.prefix() {
            32 => (base, base),
            31 => (base, base + 1),
            _ => (base + 1, base + self.len()),
        };
        HostIter { next: first, last }
    }

    /// Detect the local network from the machine's interfaces, falling
    /// back to [`DEFAULT_NETWORK`] when nothing usable is found.
    pub fn detect_local() -> Self {
        match autodetect_network() {
            Some(network) => {
                log::info!("autodetected local network {}", network);
                Self { network }
            }
            None => {
                log::warn!(
                    "no usable IPv4 interface found, falling back to {}",
                    DEFAULT_NETWORK
                );
                // The default spec is a compile-time constant and always parses.
                Self::parse(DEFAULT_NETWORK).unwrap_or_else(|_| unreachable!())
            }
        }
    }
}

impl std::fmt::Display for HostRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.network)
    }
}

/// Lazy ascending address iterator
#[derive(Debug, Clone)]
pub struct HostIter {
    next: u64,
    last: u64,
}

impl Iterator for HostIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        if self.next > self.last {
            return None;
        }
        let addr = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

fn usable_interface_addr(ip: &ipnetwork::IpNetwork) -> Option<(Ipv4Addr, u8)> {
    match ip.ip() {
        IpAddr::V4(v4) => {
            if v4.is_loopback() || v4.is_unspecified() || v4.is_link_local() {
                return None;
            }
            if ip.prefix() == 0 {
                return None;
            }
            Some((v4, ip.prefix()))
        }
        IpAddr::V6(_) => None,
    }
}

/// Containing network of the first active, non-loopback, non-link-local
/// IPv4 interface address
fn autodetect_network() -> Option<Ipv4Network> {
    for interface in datalink::interfaces() {
        if interface.is_loopback() || !interface.is_up() {
            continue;
        }
        for ip in &interface.ips {
            if let Some((addr, prefix)) = usable_interface_addr(ip) {
                if let Ok(network) = Ipv4Network::new(addr, prefix) {
                    // Normalize to the network address.
                    if let Ok(normalized) = Ipv4Network::new(network.network(), prefix) {
                        return Some(normalized);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_24_excludes_endpoints() {
        let range = HostRange::parse("192.168.1.0/24").unwrap();
        let hosts: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(range.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(*hosts.last().unwrap(), Ipv4Addr::new(192, 168, 1, 254));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
    }

    #[test]
    fn slash_30_yields_two_usable() {
        let range = HostRange::parse("10.0.0.0/30").unwrap();
        let hosts: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn slash_31_and_32_follow_host_semantics() {
        let range31 = HostRange::parse("10.0.0.0/31").unwrap();
        assert_eq!(range31.iter().count(), 2);

        let range32 = HostRange::parse("10.0.0.7/32").unwrap();
        let hosts: Vec<Ipv4Addr> = range32.iter().collect();
        assert_eq!(hosts, vec![Ipv4Addr::new(10, 0, 0, 7)]);
    }

    #[test]
    fn host_bits_are_masked() {
        let range = HostRange::parse("192.168.1.57/24").unwrap();
        assert_eq!(range.network().network(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(range.network().prefix(), 24);
    }

    #[test]
    fn enumeration_is_ascending_and_restartable() {
        let range = HostRange::parse("172.16.4.0/28").unwrap();
        let first: Vec<Ipv4Addr> = range.iter().collect();
        let second: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| u32::from(w[0]) < u32::from(w[1])));
    }

    #[test]
    fn garbage_spec_is_rejected() {
        assert!(HostRange::parse("not-a-network").is_err());
        assert!(HostRange::parse("192.168.1.0/40").is_err());
        assert!(HostRange::parse("").is_err());
    }

    #[test]
    fn default_network_always_parses() {
        let range = HostRange::parse(DEFAULT_NETWORK).unwrap();
        assert_eq!(range.len(), 254);
    }
}
