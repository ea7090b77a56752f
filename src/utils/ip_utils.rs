use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

/// IP utility functions for address classification and ranking

/// Check if an IPv6 address is link-local (fe80::/10)
pub fn is_link_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Check if an address is link-local (169.254.0.0/16 for IPv4, fe80::/10 for IPv6)
pub fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => is_link_local_v6(v6),
    }
}

/// Check if an IPv4 address is globally routable
pub fn is_global_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        // 100.64.0.0/10 (shared address space)
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // 192.0.0.0/24 (protocol assignments)
        || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
        // 198.18.0.0/15 (benchmarking)
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // 240.0.0.0/4 (reserved)
        || octets[0] >= 240)
}

/// Check if an IPv6 address is globally routable
pub fn is_global_v6(ip: &Ipv6Addr) -> bool {
    let segments = ip.segments();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || is_link_local_v6(ip)
        // fc00::/7 (unique local)
        || (segments[0] & 0xfe00) == 0xfc00
        // 2001:db8::/32 (documentation)
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
        // ::ffff:0:0/96 (IPv4-mapped)
        || ip.to_ipv4_mapped().is_some()
        // 100::/64 (discard only)
        || (segments[0] == 0x0100 && segments[1] == 0 && segments[2] == 0 && segments[3] == 0))
}

/// Check if the network an interface address belongs to is globally routable
pub fn is_global_net(net: &IpNet) -> bool {
    match net.network() {
        IpAddr::V4(v4) => is_global_v4(&v4),
        IpAddr::V6(v6) => is_global_v6(&v6),
    }
}

fn version(net: &IpNet) -> u8 {
    match net {
        IpNet::V4(_) => 4,
        IpNet::V6(_) => 6,
    }
}

/// Compare two interface addresses by visibility.
///
/// An address is more visible than another if it has a higher IP version,
/// is not link-local while the other is, belongs to a globally routable
/// network while the other does not, or finally has a greater value.
pub fn visibility_cmp(a: &IpNet, b: &IpNet) -> Ordering {
    version(a)
        .cmp(&version(b))
        .then_with(|| (!is_link_local(&a.addr())).cmp(&!is_link_local(&b.addr())))
        .then_with(|| is_global_net(a).cmp(&is_global_net(b)))
        .then_with(|| a.addr().cmp(&b.addr()))
}

/// Return the most visible address of a set of interface addresses
pub fn most_visible<I>(addresses: I) -> Option<IpNet>
where
    I: IntoIterator<Item = IpNet>,
{
    addresses.into_iter().max_by(visibility_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_link_local_detection() {
        assert!(is_link_local(&"169.254.3.4".parse().unwrap()));
        assert!(is_link_local(&"fe80::1".parse().unwrap()));
        assert!(!is_link_local(&"fec0::1".parse().unwrap()));
        assert!(!is_link_local(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_global_classification() {
        assert!(is_global_v4(&"8.8.8.8".parse().unwrap()));
        assert!(!is_global_v4(&"192.168.1.1".parse().unwrap()));
        assert!(!is_global_v4(&"100.64.0.1".parse().unwrap()));
        assert!(!is_global_v4(&"198.19.0.1".parse().unwrap()));
        assert!(is_global_v6(&"2a00:1450::1".parse().unwrap()));
        assert!(!is_global_v6(&"fc00::1".parse().unwrap()));
        assert!(!is_global_v6(&"2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_visibility_prefers_ipv6() {
        assert_eq!(
            visibility_cmp(&net("fc00::1/64"), &net("8.8.8.8/24")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_visibility_ranks_scope_then_value() {
        // Link-local loses even against a smaller private address
        assert_eq!(
            visibility_cmp(&net("169.254.9.9/16"), &net("10.0.0.1/24")),
            Ordering::Less
        );
        // Global wins over private regardless of value
        assert_eq!(
            visibility_cmp(&net("1.2.3.4/24"), &net("192.168.0.1/24")),
            Ordering::Greater
        );
        assert_eq!(
            visibility_cmp(&net("10.0.0.2/24"), &net("10.0.0.1/24")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_most_visible() {
        let addresses = vec![net("10.0.0.1/30"), net("192.168.0.5/24"), net("169.254.0.1/16")];
        assert_eq!(most_visible(addresses), Some(net("192.168.0.5/24")));
        assert_eq!(most_visible(Vec::new()), None);
    }
}
