//! Best-effort hardware-address resolution
//!
//! The prober calls this at most once per responding address, right
//! after an echo exchange, so the kernel's neighbor cache normally
//! already holds the entry. Any failure yields `None` and is never
//! retried; hosts simply stay without a hardware-address annotation.

use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Look up the hardware address the OS has cached for `addr`
pub fn lookup_hardware_addr(addr: Ipv4Addr) -> Option<MacAddr> {
    neighbor_cache_lookup(addr)
}

#[cfg(target_os = "linux")]
fn neighbor_cache_lookup(addr: Ipv4Addr) -> Option<MacAddr> {
    let table = std::fs::read_to_string("/proc/net/arp").ok()?;
    parse_neighbor_table(&table, addr)
}

#[cfg(not(target_os = "linux"))]
fn neighbor_cache_lookup(_addr: Ipv4Addr) -> Option<MacAddr> {
    None
}

/// Parse a /proc/net/arp style table: one header line, then
/// `IP address  HW type  Flags  HW address  Mask  Device` rows.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_neighbor_table(table: &str, addr: Ipv4Addr) -> Option<MacAddr> {
    for line in table.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(ip), _hw_type, Some(flags), Some(mac)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if ip.parse::<Ipv4Addr>() != Ok(addr) {
            continue;
        }
        // Flag 0x0 marks an incomplete entry.
        if flags == "0x0" {
            return None;
        }

        let mac = MacAddr::from_str(mac).ok()?;
        if mac == MacAddr::zero() {
            return None;
        }
        return Some(mac);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         14:82:5b:aa:bb:cc     *        eth0
192.168.1.44     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.50     0x1         0x2         58:6c:25:11:22:33     *        wlan0
";

    #[test]
    fn complete_entry_resolves() {
        let mac = parse_neighbor_table(TABLE, Ipv4Addr::new(192, 168, 1, 1)).unwrap();
        assert_eq!(mac, MacAddr::new(0x14, 0x82, 0x5b, 0xaa, 0xbb, 0xcc));
    }

    #[test]
    fn incomplete_entry_is_none() {
        assert!(parse_neighbor_table(TABLE, Ipv4Addr::new(192, 168, 1, 44)).is_none());
    }

    #[test]
    fn unknown_address_is_none() {
        assert!(parse_neighbor_table(TABLE, Ipv4Addr::new(10, 0, 0, 1)).is_none());
    }
}
