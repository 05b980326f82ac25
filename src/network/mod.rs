//! Network layer: range enumeration, raw ICMP, neighbor-cache lookup
//! and device metadata resolution.

pub mod arp;
pub mod device;
pub mod icmp;
pub mod range;

pub use device::{DeviceClass, HostMetadata};
pub use icmp::{IcmpPinger, PingReply};
pub use range::HostRange;
