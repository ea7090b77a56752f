//! Overlays: properties spanning several nodes or links.
//!
//! Overlays are applied to a [`Topology`] before address allocation, in
//! declaration order. They set AS numbers, BGP sessions, IGP areas and
//! static subnets.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use log::debug;
use serde::{Deserialize, Serialize};

use super::graph::{Topology, TopologyError};
use super::types::{IntfId, NodeId};
use crate::ip::address_space::{V4_RESERVED, V6_RESERVED};
use crate::ip::domain::DomainBlock;

/// Addresses withheld in each prefix of a `subnet` overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetReservation {
    pub v4: u8,
    pub v6: u8,
}

impl Default for SubnetReservation {
    fn default() -> Self {
        Self {
            v4: V4_RESERVED,
            v6: V6_RESERVED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Overlay {
    /// Put routers in an autonomous system
    As { asn: u32, routers: Vec<String> },
    /// Autonomous system with a BGP session between every pair of routers
    IbgpFullMesh { asn: u32, routers: Vec<String> },
    BgpPeering { a: String, b: String },
    /// BGP session whose link is kept out of the IGP
    EbgpSession { a: String, b: String },
    RouteReflector { rr: String, peers: Vec<String> },
    OspfArea {
        area: String,
        #[serde(default)]
        routers: Vec<String>,
        #[serde(default)]
        links: Vec<(String, String)>,
    },
    /// Static addresses for the endpoints of links, one per endpoint and prefix
    Subnet {
        links: Vec<(String, String)>,
        prefixes: Vec<IpNet>,
    },
}

impl Overlay {
    pub fn apply(&self, topo: &mut Topology, reservation: SubnetReservation) -> Result<(), TopologyError> {
        match self {
            Self::As { asn, routers } => set_as(topo, *asn, routers),
            Self::IbgpFullMesh { asn, routers } => {
                set_as(topo, *asn, routers)?;
                bgp_fullmesh(topo, routers)
            }
            Self::BgpPeering { a, b } => bgp_peering(topo, a, b),
            Self::EbgpSession { a, b } => ebgp_session(topo, a, b),
            Self::RouteReflector { rr, peers } => set_rr(topo, rr, peers),
            Self::OspfArea {
                area,
                routers,
                links,
            } => set_ospf_area(topo, area, routers, links),
            Self::Subnet { links, prefixes } => assign_subnet(topo, links, prefixes, reservation),
        }
    }
}

/// Set the AS number of every router of `routers`
pub fn set_as(topo: &mut Topology, asn: u32, routers: &[String]) -> Result<(), TopologyError> {
    for name in routers {
        let id = topo.require_router(name)?;
        topo.node_mut(id).asn = Some(asn);
    }
    Ok(())
}

fn add_peer(topo: &mut Topology, node: NodeId, peer: &str) {
    let peers = &mut topo.node_mut(node).bgp_peers;
    if !peers.iter().any(|p| p == peer) {
        peers.push(peer.to_string());
    }
}

/// Register a BGP session between two routers
pub fn bgp_peering(topo: &mut Topology, a: &str, b: &str) -> Result<(), TopologyError> {
    let id_a = topo.require_router(a)?;
    let id_b = topo.require_router(b)?;
    add_peer(topo, id_a, b);
    add_peer(topo, id_b, a);
    debug!("BGP peering {} <-> {}", a, b);
    Ok(())
}

/// Register a BGP session between every pair of `routers`
pub fn bgp_fullmesh(topo: &mut Topology, routers: &[String]) -> Result<(), TopologyError> {
    for (i, a) in routers.iter().enumerate() {
        for b in &routers[i + 1..] {
            bgp_peering(topo, a, b)?;
        }
    }
    Ok(())
}

/// Register a BGP session and make the links between both routers IGP passive
pub fn ebgp_session(topo: &mut Topology, a: &str, b: &str) -> Result<(), TopologyError> {
    bgp_peering(topo, a, b)?;
    let id_a = topo.require_router(a)?;
    let id_b = topo.require_router(b)?;
    for intf in link_endpoints(topo, id_a, id_b) {
        topo.interface_mut(intf).igp_passive = true;
    }
    Ok(())
}

/// Make `rr` a route reflector for `peers`
pub fn set_rr(topo: &mut Topology, rr: &str, peers: &[String]) -> Result<(), TopologyError> {
    let rr_id = topo.require_router(rr)?;
    for peer in peers {
        bgp_peering(topo, rr, peer)?;
        let clients = &mut topo.node_mut(rr_id).rr_clients;
        if !clients.iter().any(|c| c == peer) {
            clients.push(peer.clone());
        }
    }
    Ok(())
}

fn set_ospf_area(
    topo: &mut Topology,
    area: &str,
    routers: &[String],
    links: &[(String, String)],
) -> Result<(), TopologyError> {
    let mut interfaces: Vec<IntfId> = Vec::new();
    for name in routers {
        let id = topo.require_router(name)?;
        interfaces.extend(topo.node(id).interfaces.iter().copied());
    }
    for (a, b) in links {
        interfaces.extend(require_link_endpoints(topo, a, b)?);
    }
    for intf in interfaces {
        topo.interface_mut(intf).igp_area = area.to_string();
    }
    Ok(())
}

/// Both interfaces of every link between `a` and `b`
fn link_endpoints(topo: &Topology, a: NodeId, b: NodeId) -> Vec<IntfId> {
    topo.links_between(a, b)
        .into_iter()
        .flat_map(|id| {
            let link = topo.link(id);
            [link.intf1, link.intf2]
        })
        .collect()
}

fn require_link_endpoints(topo: &Topology, a: &str, b: &str) -> Result<Vec<IntfId>, TopologyError> {
    let endpoints = link_endpoints(topo, topo.require_node(a)?, topo.require_node(b)?);
    if endpoints.is_empty() {
        return Err(TopologyError::NoSuchLink {
            a: a.to_string(),
            b: b.to_string(),
        });
    }
    Ok(endpoints)
}

/// Issues addresses out of one overlay prefix
enum SubnetCursor {
    V4(DomainBlock<Ipv4Net>),
    V6(DomainBlock<Ipv6Net>),
}

impl SubnetCursor {
    fn new(prefix: IpNet, reservation: SubnetReservation) -> Self {
        match prefix {
            IpNet::V4(net) => Self::V4(DomainBlock::new(net, reservation.v4)),
            IpNet::V6(net) => Self::V6(DomainBlock::new(net, reservation.v6)),
        }
    }

    fn next(&mut self) -> Option<IpNet> {
        match self {
            Self::V4(block) => block.next().map(IpNet::V4),
            Self::V6(block) => block.next().map(IpNet::V6),
        }
    }
}

fn assign_subnet(
    topo: &mut Topology,
    links: &[(String, String)],
    prefixes: &[IpNet],
    reservation: SubnetReservation,
) -> Result<(), TopologyError> {
    let mut cursors: Vec<(IpNet, SubnetCursor)> = prefixes
        .iter()
        .map(|p| (p.trunc(), SubnetCursor::new(*p, reservation)))
        .collect();

    for (a, b) in links {
        let endpoints = require_link_endpoints(topo, a, b)?;
        for intf in endpoints {
            if !topo.node_of(intf).kind.is_domain_boundary() {
                continue;
            }
            for (prefix, cursor) in cursors.iter_mut() {
                let addr = cursor.next().ok_or_else(|| TopologyError::SubnetTooSmall {
                    prefix: prefix.to_string(),
                    interface: topo.interface(intf).name.clone(),
                })?;
                let interface = topo.interface_mut(intf);
                interface.static_addresses.push(addr);
                interface.addresses.push(addr);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{HasAddresses, LinkParams};

    fn two_routers() -> (Topology, NodeId, NodeId) {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        topo.add_link(r1, r2, LinkParams::new());
        (topo, r1, r2)
    }

    #[test]
    fn test_ibgp_full_mesh() {
        let mut topo = Topology::new();
        for name in ["r1", "r2", "r3"] {
            topo.add_router(name).unwrap();
        }
        let routers: Vec<String> = vec!["r1".into(), "r2".into(), "r3".into()];
        Overlay::IbgpFullMesh { asn: 65000, routers }
            .apply(&mut topo, SubnetReservation::default())
            .unwrap();

        let r2 = topo.node(topo.node_id("r2").unwrap());
        assert_eq!(r2.asn, Some(65000));
        assert_eq!(r2.bgp_peers, vec!["r1".to_string(), "r3".to_string()]);
    }

    #[test]
    fn test_ebgp_session_sets_passive() {
        let (mut topo, r1, r2) = two_routers();
        ebgp_session(&mut topo, "r1", "r2").unwrap();
        for node in [r1, r2] {
            let intf = topo.node(node).interfaces[0];
            assert!(topo.interface(intf).igp_passive);
        }
        // Peering is idempotent
        bgp_peering(&mut topo, "r2", "r1").unwrap();
        assert_eq!(topo.node(r1).bgp_peers.len(), 1);
    }

    #[test]
    fn test_as_rejects_hosts() {
        let mut topo = Topology::new();
        topo.add_host("h1").unwrap();
        let result = set_as(&mut topo, 1, &["h1".to_string()]);
        assert!(matches!(result, Err(TopologyError::NotARouter { .. })));
    }

    #[test]
    fn test_route_reflector() {
        let mut topo = Topology::new();
        for name in ["rr", "c1", "c2"] {
            topo.add_router(name).unwrap();
        }
        set_rr(&mut topo, "rr", &["c1".to_string(), "c2".to_string()]).unwrap();
        let rr = topo.node(topo.node_id("rr").unwrap());
        assert_eq!(rr.rr_clients, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(rr.bgp_peers.len(), 2);
    }

    #[test]
    fn test_ospf_area() {
        let (mut topo, r1, r2) = two_routers();
        Overlay::OspfArea {
            area: "0.0.0.1".to_string(),
            routers: vec![],
            links: vec![("r1".to_string(), "r2".to_string())],
        }
        .apply(&mut topo, SubnetReservation::default())
        .unwrap();
        let i1 = topo.node(r1).interfaces[0];
        let i2 = topo.node(r2).interfaces[0];
        assert_eq!(topo.interface(i1).igp_area, "0.0.0.1");
        assert_eq!(topo.interface(i2).igp_area, "0.0.0.1");

        let missing = Overlay::OspfArea {
            area: "0.0.0.2".to_string(),
            routers: vec![],
            links: vec![("r1".to_string(), "r1".to_string())],
        };
        assert!(matches!(
            missing.apply(&mut topo, SubnetReservation::default()),
            Err(TopologyError::NoSuchLink { .. })
        ));
    }

    #[test]
    fn test_subnet_overlay() {
        let (mut topo, r1, r2) = two_routers();
        let overlay = Overlay::Subnet {
            links: vec![("r1".to_string(), "r2".to_string())],
            prefixes: vec!["10.9.0.0/30".parse().unwrap(), "fd00:9::/64".parse().unwrap()],
        };
        overlay.apply(&mut topo, SubnetReservation::default()).unwrap();

        let i1 = topo.interface(topo.node(r1).interfaces[0]);
        let i2 = topo.interface(topo.node(r2).interfaces[0]);
        assert_eq!(i1.ip(), Some("10.9.0.1/30".parse().unwrap()));
        assert_eq!(i2.ip(), Some("10.9.0.2/30".parse().unwrap()));
        assert_eq!(i2.ip6(), Some("fd00:9::2/64".parse().unwrap()));
        assert_eq!(i1.static_addresses.len(), 2);
    }

    #[test]
    fn test_subnet_overlay_too_small() {
        let (mut topo, _, _) = two_routers();
        let overlay = Overlay::Subnet {
            links: vec![("r1".to_string(), "r2".to_string())],
            prefixes: vec!["10.9.0.0/31".parse().unwrap()],
        };
        assert!(matches!(
            overlay.apply(&mut topo, SubnetReservation::default()),
            Err(TopologyError::SubnetTooSmall { .. })
        ));
    }

    #[test]
    fn test_subnet_overlay_reservation() {
        let (mut topo, r1, r2) = two_routers();
        let overlay = Overlay::Subnet {
            links: vec![("r1".to_string(), "r2".to_string())],
            prefixes: vec!["10.9.0.0/31".parse().unwrap()],
        };
        overlay
            .apply(&mut topo, SubnetReservation { v4: 0, v6: 0 })
            .unwrap();

        let i1 = topo.interface(topo.node(r1).interfaces[0]);
        let i2 = topo.interface(topo.node(r2).interfaces[0]);
        assert_eq!(i1.ip(), Some("10.9.0.0/31".parse().unwrap()));
        assert_eq!(i2.ip(), Some("10.9.0.1/31".parse().unwrap()));
    }
}
