use std::net::{Ipv4Addr, Ipv6Addr};

use dyncert_tls::{HostKind, SanAccumulator, classify_host};
use proptest::prelude::*;

fn dns_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9-]{0,20}(\\.[a-z][a-z0-9-]{0,20}){0,3}")
        .expect("dns regex")
}

proptest! {
    #[test]
    fn ipv4_literals_are_ip_sans(addr in any::<Ipv4Addr>(), port in proptest::option::of(1u16..=u16::MAX)) {
        let host = match port {
            Some(port) => format!("{addr}:{port}"),
            None => addr.to_string(),
        };
        let classified = classify_host(&host);
        prop_assert!(
            matches!(&classified, Some(HostKind::Ip(ip)) if ip.literal == addr.to_string()),
            "{host} classified as {classified:?}"
        );
    }

    #[test]
    fn masked_ipv4_literals_are_ip_sans(addr in any::<Ipv4Addr>(), prefix in 0u8..=32) {
        let host = format!("{addr}/{prefix}");
        prop_assert!(matches!(classify_host(&host), Some(HostKind::Ip(_))));
    }

    #[test]
    fn ipv6_literals_are_ip_sans(addr in any::<Ipv6Addr>(), prefix in 0u8..=128) {
        prop_assert!(matches!(classify_host(&addr.to_string()), Some(HostKind::Ip(_))));
        let bracketed = format!("[{addr}]:443");
        prop_assert!(matches!(classify_host(&bracketed), Some(HostKind::Ip(_))));
        let masked = format!("{addr}/{prefix}");
        prop_assert!(matches!(classify_host(&masked), Some(HostKind::Ip(_))));
    }

    #[test]
    fn hostnames_are_dns_sans(name in dns_strategy(), port in 1u16..=u16::MAX) {
        prop_assert_eq!(classify_host(&name), Some(HostKind::Dns(name.clone())));
        prop_assert_eq!(
            classify_host(&format!("{name}:{port}")),
            Some(HostKind::Dns(name.clone()))
        );
    }

    #[test]
    fn accumulator_never_shrinks(hosts in proptest::collection::vec(dns_strategy(), 0..16)) {
        let accumulator = SanAccumulator::new();
        let mut previous = 0;
        for host in &hosts {
            accumulator.add_host(host);
            prop_assert!(accumulator.len() >= previous);
            previous = accumulator.len();
        }
        let mut unique = hosts.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(accumulator.len(), unique.len());
    }
}
