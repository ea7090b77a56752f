//! Peer address resolution.
//!
//! Finds the address a router should use to reach a named peer router: a
//! lowest-cost walk over broadcast domains, costed with the IGP metric of
//! the interfaces it leaves through, that never enters a router of a
//! foreign AS.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::net::IpAddr;

use crate::ip::DomainSet;
use crate::topology::{HasAddresses, Interface, IntfId, NodeId, Topology};

/// Resolved address of a peer and the router owning it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    pub address: IpAddr,
    pub router: NodeId,
}

fn interface_address(intf: &Interface, want_ipv6: bool) -> Option<IpAddr> {
    if want_ipv6 {
        intf.ip6().map(|net| IpAddr::V6(net.addr()))
    } else {
        intf.ip().map(|net| IpAddr::V4(net.addr()))
    }
}

/// Resolve the address of router `target` as seen from router `base`.
///
/// The first interface of `target` met by the walk provides the address; if
/// that interface has no address of the requested family (link-local IPv6
/// excluded) the peer is unresolvable and `None` is returned. Routers
/// without an AS are traversed whatever the AS of `base`.
pub fn find_peer_address(
    topo: &Topology,
    domains: &DomainSet,
    base: NodeId,
    target: &str,
    want_ipv6: bool,
) -> Option<PeerAddress> {
    let base_asn = topo.node(base).asn;
    let mut visited: HashSet<IntfId> = HashSet::new();
    let mut queue: BinaryHeap<Reverse<(u64, usize, IntfId)>> = BinaryHeap::new();
    let mut seq = 0usize;

    for &intf in &topo.node(base).interfaces {
        queue.push(Reverse((u64::from(topo.interface(intf).igp_metric), seq, intf)));
        seq += 1;
    }

    while let Some(Reverse((cost, _, intf))) = queue.pop() {
        if !visited.insert(intf) {
            continue;
        }
        let Some(domain) = domains.domain_for(intf) else {
            continue;
        };
        for member in domain.routers(topo) {
            let router = topo.interface(member).node;
            let node = topo.node(router);
            if node.name == target {
                return interface_address(topo.interface(member), want_ipv6)
                    .map(|address| PeerAddress { address, router });
            }
            if node.asn.is_some() && node.asn != base_asn {
                continue;
            }
            for &next in &node.interfaces {
                if !visited.contains(&next) {
                    let metric = u64::from(topo.interface(next).igp_metric);
                    queue.push(Reverse((cost + metric, seq, next)));
                    seq += 1;
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::compute_domains;
    use crate::topology::{IntfParams, LinkParams};

    fn addressed(a: &str, b: &str) -> LinkParams {
        LinkParams::new()
            .params1(IntfParams::new().address(a.parse().unwrap()))
            .params2(IntfParams::new().address(b.parse().unwrap()))
    }

    #[test]
    fn test_direct_neighbor() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        topo.add_link(r1, r2, addressed("10.0.0.1/30", "10.0.0.2/30"));
        let domains = compute_domains(&topo);

        let peer = find_peer_address(&topo, &domains, r1, "r2", false).unwrap();
        assert_eq!(peer.address, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(peer.router, r2);
        // No IPv6 address on the link
        assert_eq!(find_peer_address(&topo, &domains, r1, "r2", true), None);
    }

    #[test]
    fn test_link_local_ipv6_is_not_a_peer_address() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let params = addressed("10.0.0.1/30", "10.0.0.2/30")
            .params2(
                IntfParams::new()
                    .address("10.0.0.2/30".parse().unwrap())
                    .address("fe80::2/64".parse().unwrap()),
            );
        topo.add_link(r1, r2, params);
        let domains = compute_domains(&topo);

        assert_eq!(find_peer_address(&topo, &domains, r1, "r2", true), None);
        // IPv4 is still resolved
        assert!(find_peer_address(&topo, &domains, r1, "r2", false).is_some());

        // A global address next to the link-local one is picked
        let intf = topo.node(r2).interfaces[0];
        topo.interface_mut(intf).addresses.push("fd00::2/64".parse().unwrap());
        let peer = find_peer_address(&topo, &domains, r1, "r2", true).unwrap();
        assert_eq!(peer.address, "fd00::2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_cheapest_path_wins() {
        // r1 reaches r3 directly at cost 10 or through r2 at cost 2
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let r3 = topo.add_router("r3").unwrap();
        topo.add_link(r1, r3, addressed("10.0.13.1/30", "10.0.13.2/30").igp_metric(10));
        topo.add_link(r1, r2, addressed("10.0.12.1/30", "10.0.12.2/30"));
        topo.add_link(r2, r3, addressed("10.0.23.1/30", "10.0.23.2/30"));
        let domains = compute_domains(&topo);

        let peer = find_peer_address(&topo, &domains, r1, "r3", false).unwrap();
        assert_eq!(peer.address, "10.0.23.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_foreign_as_not_traversed() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let r3 = topo.add_router("r3").unwrap();
        topo.add_link(r1, r2, addressed("10.0.12.1/30", "10.0.12.2/30"));
        topo.add_link(r2, r3, addressed("10.0.23.1/30", "10.0.23.2/30"));
        topo.node_mut(r1).asn = Some(1);
        topo.node_mut(r2).asn = Some(2);
        topo.node_mut(r3).asn = Some(1);
        let domains = compute_domains(&topo);

        // r2 itself is reachable, r3 lies behind it
        assert!(find_peer_address(&topo, &domains, r1, "r2", false).is_some());
        assert_eq!(find_peer_address(&topo, &domains, r1, "r3", false), None);

        // An AS-less transit router is transparent
        topo.node_mut(r2).asn = None;
        assert!(find_peer_address(&topo, &domains, r1, "r3", false).is_some());
    }

    #[test]
    fn test_unknown_target() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let domains = compute_domains(&topo);
        assert_eq!(find_peer_address(&topo, &domains, r1, "nobody", false), None);
    }
}
