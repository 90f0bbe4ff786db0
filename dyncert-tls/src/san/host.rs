use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A validated IP literal, optionally carrying a network mask
/// (`10.0.0.0/8`, `10.0.0.0/255.0.0.0`, `fd00::/64`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpSan {
    pub literal: String,
    pub address: IpAddr,
    pub mask: Option<IpMask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpMask {
    Prefix(u8),
    Address(IpAddr),
}

impl fmt::Display for IpSan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Ip(IpSan),
    Dns(String),
}

/// Drops a trailing `:port` from `host`. Bracketed IPv6 (`[::1]:443`) loses
/// its brackets; a bare IPv6 literal is returned untouched.
pub fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &rest[..end],
            None => host,
        };
    }
    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => name,
        _ => host,
    }
}

/// Classifies a host token, port already stripped. IPv6 with mask, plain
/// IPv6, IPv4 with mask and plain IPv4 are tried in that order; anything
/// else is a DNS name. Blank input yields `None`.
pub fn classify_host(host: &str) -> Option<HostKind> {
    let token = strip_port(host);
    if token.is_empty() {
        return None;
    }
    let ip = parse_ipv6_with_mask(token)
        .or_else(|| parse_ipv6(token))
        .or_else(|| parse_ipv4_with_mask(token))
        .or_else(|| parse_ipv4(token));
    Some(match ip {
        Some(ip) => HostKind::Ip(ip),
        None => HostKind::Dns(token.to_string()),
    })
}

fn parse_ipv6(token: &str) -> Option<IpSan> {
    let address = token.parse::<Ipv6Addr>().ok()?;
    Some(IpSan {
        literal: token.to_string(),
        address: IpAddr::V6(address),
        mask: None,
    })
}

fn parse_ipv4(token: &str) -> Option<IpSan> {
    let address = token.parse::<Ipv4Addr>().ok()?;
    Some(IpSan {
        literal: token.to_string(),
        address: IpAddr::V4(address),
        mask: None,
    })
}

fn parse_ipv6_with_mask(token: &str) -> Option<IpSan> {
    let (address, mask) = token.split_once('/')?;
    let address = address.parse::<Ipv6Addr>().ok()?;
    let mask = parse_mask(mask, 128, |value| {
        value.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    })?;
    Some(IpSan {
        literal: token.to_string(),
        address: IpAddr::V6(address),
        mask: Some(mask),
    })
}

fn parse_ipv4_with_mask(token: &str) -> Option<IpSan> {
    let (address, mask) = token.split_once('/')?;
    let address = address.parse::<Ipv4Addr>().ok()?;
    let mask = parse_mask(mask, 32, |value| {
        value.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    })?;
    Some(IpSan {
        literal: token.to_string(),
        address: IpAddr::V4(address),
        mask: Some(mask),
    })
}

fn parse_mask(
    value: &str,
    max_prefix: u8,
    as_address: impl Fn(&str) -> Option<IpAddr>,
) -> Option<IpMask> {
    if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
        return value
            .parse::<u8>()
            .ok()
            .filter(|prefix| *prefix <= max_prefix)
            .map(IpMask::Prefix);
    }
    as_address(value).map(IpMask::Address)
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use assert_matches::assert_matches;

    use super::{HostKind, IpMask, classify_host, strip_port};

    #[test]
    fn strips_port_from_names_and_ipv4() {
        assert_eq!(strip_port("example.com:8443"), "example.com");
        assert_eq!(strip_port("10.0.0.5:80"), "10.0.0.5");
        assert_eq!(strip_port("example.com"), "example.com");
    }

    #[test]
    fn leaves_bare_ipv6_intact() {
        assert_eq!(strip_port("::1"), "::1");
        assert_eq!(strip_port("fe80::1:2"), "fe80::1:2");
    }

    #[test]
    fn strips_brackets_and_port_from_ipv6() {
        assert_eq!(strip_port("[::1]:8443"), "::1");
        assert_eq!(strip_port("[2001:db8::7]"), "2001:db8::7");
    }

    #[test]
    fn classifies_masked_literals_as_ip() {
        assert_matches!(
            classify_host("10.0.0.0/8"),
            Some(HostKind::Ip(ip)) if ip.mask == Some(IpMask::Prefix(8))
        );
        assert_matches!(
            classify_host("10.0.0.0/255.0.0.0"),
            Some(HostKind::Ip(ip)) if ip.mask == Some(IpMask::Address("255.0.0.0".parse().unwrap()))
        );
        assert_matches!(
            classify_host("fd00::/64"),
            Some(HostKind::Ip(ip)) if ip.address == "fd00::".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn out_of_range_prefix_is_not_an_ip() {
        assert_matches!(classify_host("10.0.0.0/33"), Some(HostKind::Dns(_)));
        assert_matches!(classify_host("fd00::/129"), Some(HostKind::Dns(_)));
    }

    #[test]
    fn names_and_blank_tokens() {
        assert_eq!(
            classify_host("api.example.com"),
            Some(HostKind::Dns("api.example.com".to_string()))
        );
        assert_eq!(
            classify_host("localhost:1080"),
            Some(HostKind::Dns("localhost".to_string()))
        );
        assert_eq!(classify_host(""), None);
        assert_eq!(classify_host(":443"), None);
    }
}
