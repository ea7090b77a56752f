//! BGP neighbor lists.

use std::net::IpAddr;

use log::debug;
use serde::Serialize;

use super::daemon::BGP_DEFAULT_PORT;
use super::peer::find_peer_address;
use crate::ip::{AddressFamily, DomainSet};
use crate::topology::{NodeId, Topology};

/// One BGP session as seen from the local router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpNeighbor {
    pub peer: String,
    pub address: IpAddr,
    pub asn: Option<u32>,
    pub family: AddressFamily,
    pub port: u16,
    pub ebgp: bool,
    pub ebgp_multihop: bool,
    pub description: String,
}

/// Build the session from `base` to `peer` over one address family
pub fn build_neighbor(
    topo: &Topology,
    domains: &DomainSet,
    base: NodeId,
    peer: &str,
    want_ipv6: bool,
) -> Option<BgpNeighbor> {
    let resolved = find_peer_address(topo, domains, base, peer, want_ipv6)?;
    let remote = topo.node(resolved.router);
    let ebgp = remote.asn != topo.node(base).asn;
    Some(BgpNeighbor {
        peer: peer.to_string(),
        address: resolved.address,
        asn: remote.asn,
        family: if want_ipv6 {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        },
        port: remote.bgp_port().unwrap_or(BGP_DEFAULT_PORT),
        ebgp,
        ebgp_multihop: ebgp,
        description: format!("{} ({})", peer, if ebgp { "eBGP" } else { "iBGP" }),
    })
}

fn neighbors_of(topo: &Topology, domains: &DomainSet, router: NodeId, peers: &[String]) -> Vec<BgpNeighbor> {
    let mut neighbors = Vec::new();
    for peer in peers {
        for want_ipv6 in [true, false] {
            match build_neighbor(topo, domains, router, peer, want_ipv6) {
                Some(neighbor) => neighbors.push(neighbor),
                None => debug!(
                    "No {} address found to reach {} from {}",
                    if want_ipv6 { "IPv6" } else { "IPv4" },
                    peer,
                    topo.node(router).name
                ),
            }
        }
    }
    neighbors
}

/// Sessions towards every BGP peer of `router`, IPv6 first
pub fn bgp_neighbors(topo: &Topology, domains: &DomainSet, router: NodeId) -> Vec<BgpNeighbor> {
    neighbors_of(topo, domains, router, &topo.node(router).bgp_peers)
}

/// Sessions towards the route-reflector clients of `router`
pub fn rr_clients(topo: &Topology, domains: &DomainSet, router: NodeId) -> Vec<BgpNeighbor> {
    neighbors_of(topo, domains, router, &topo.node(router).rr_clients)
}
