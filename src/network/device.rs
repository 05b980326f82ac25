//! Host metadata: display names and coarse device classification
//!
//! Classification is heuristic. Well-known last octets are checked
//! first, then the hardware address: locally administered MACs are
//! treated as virtual or randomized interfaces, everything else goes
//! through a small OUI vendor table.

use once_cell::sync::Lazy;
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Coarse device class for display panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Gateway,
    NetworkDevice,
    Computer,
    Mobile,
    Virtual,
    Unknown,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceClass::Gateway => "gateway",
            DeviceClass::NetworkDevice => "network device",
            DeviceClass::Computer => "computer",
            DeviceClass::Mobile => "mobile",
            DeviceClass::Virtual => "virtual",
            DeviceClass::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Cached per-host annotation, resolved once on first sighting
#[derive(Debug, Clone, PartialEq)]
pub struct HostMetadata {
    pub display_name: String,
    pub device_class: DeviceClass,
    pub hardware_addr: Option<MacAddr>,
}

static OUI_VENDORS: Lazy<HashMap<[u8; 3], (&'static str, DeviceClass)>> = Lazy::new(|| {
    HashMap::from([
        ([0x14, 0x82, 0x5B], ("TP-Link", DeviceClass::NetworkDevice)),
        ([0x58, 0x6C, 0x25], ("Intel", DeviceClass::Computer)),
        ([0xB4, 0xB0, 0x24], ("Samsung", DeviceClass::Mobile)),
        ([0xC0, 0x95, 0x6D], ("Apple", DeviceClass::Mobile)),
        ([0x18, 0x83, 0xBF], ("Xiaomi", DeviceClass::Mobile)),
    ])
});

/// Bit 2 of the first byte distinguishes locally administered
/// (virtual/randomized) addresses from burned-in hardware ones.
fn is_locally_administered(mac: MacAddr) -> bool {
    mac.0 & 0x02 != 0
}

fn vendor_for(mac: MacAddr) -> Option<(&'static str, DeviceClass)> {
    OUI_VENDORS.get(&[mac.0, mac.1, mac.2]).copied()
}

/// Resolve display name and device class for an address.
///
/// Never fails; when nothing matches, the host gets a generic
/// `Host-<last octet>` name.
pub fn resolve_metadata(addr: Ipv4Addr, hardware_addr: Option<MacAddr>) -> HostMetadata {
    let last_octet = addr.octets()[3];

    let (display_name, device_class) = match last_octet {
        1 => ("Gateway".to_string(), DeviceClass::Gateway),
        252..=254 => ("Router".to_string(), DeviceClass::NetworkDevice),
        _ => match hardware_addr {
            Some(mac) if is_locally_administered(mac) => {
                ("Random".to_string(), DeviceClass::Virtual)
            }
            Some(mac) => match vendor_for(mac) {
                Some((vendor, class)) => (vendor.to_string(), class),
                None => (format!("Host-{}", last_octet), DeviceClass::Unknown),
            },
            None => (format!("Host-{}", last_octet), DeviceClass::Unknown),
        },
    };

    HostMetadata {
        display_name,
        device_class,
        hardware_addr,
    }
}
