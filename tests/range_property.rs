//! Property tests for range enumeration

use netradar::HostRange;
use proptest::prelude::*;
use std::net::Ipv4Addr;

proptest! {
    /// For any prefix up to /30 the enumerator yields 2^(32-prefix) - 2
    /// addresses, excluding exactly the network and broadcast addresses.
    #[test]
    fn usable_host_count_matches_prefix(base in any::<u32>(), prefix in 20u8..=30) {
        let spec = format!("{}/{}", Ipv4Addr::from(base), prefix);
        let range = HostRange::parse(&spec).unwrap();

        let expected = (1u64 << (32 - prefix)) - 2;
        prop_assert_eq!(range.len(), expected);
        prop_assert_eq!(range.iter().count() as u64, expected);

        let network = u32::from(range.network().network());
        let broadcast = u32::from(range.network().broadcast());
        let first = range.iter().next().unwrap();
        let last = range.iter().last().unwrap();
        prop_assert_eq!(u32::from(first), network + 1);
        prop_assert_eq!(u32::from(last), broadcast - 1);
    }

    /// Enumeration is strictly ascending regardless of the base address.
    #[test]
    fn enumeration_is_strictly_ascending(base in any::<u32>(), prefix in 24u8..=30) {
        let spec = format!("{}/{}", Ipv4Addr::from(base), prefix);
        let range = HostRange::parse(&spec).unwrap();

        let hosts: Vec<u32> = range.iter().map(u32::from).collect();
        prop_assert!(hosts.windows(2).all(|w| w[0] < w[1]));
    }

    /// Parsing masks host bits: the normalized network contains the base.
    #[test]
    fn normalization_contains_base(base in any::<u32>(), prefix in 16u8..=30) {
        let addr = Ipv4Addr::from(base);
        let spec = format!("{}/{}", addr, prefix);
        let range = HostRange::parse(&spec).unwrap();
        prop_assert!(range.network().contains(addr));
    }
}
