//! Broadcast domain discovery and per-domain address issuance.
//!
//! A broadcast domain is the set of router/host interfaces that can reach
//! each other without crossing a layer-3 device. Switches are transparent:
//! discovery walks through them and never adds their interfaces.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use ipnet::{Ipv4Net, Ipv6Net};
use log::debug;

use super::address_space::Prefix;
use super::error::AllocationError;
use crate::topology::{Interface, IntfId, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub usize);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A subnet bound to a domain and the cursor issuing addresses from it.
///
/// With `reserved` addresses set aside, the first one (if any) is the
/// network address and the remaining ones sit at the top of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainBlock<P: Prefix> {
    net: P,
    reserved: u8,
    cursor: u128,
    taken: BTreeSet<u128>,
}

impl<P: Prefix> DomainBlock<P> {
    pub fn new(net: P, reserved: u8) -> Self {
        let net = net.truncated();
        Self {
            net,
            reserved,
            cursor: Self::leading(reserved),
            taken: BTreeSet::new(),
        }
    }

    fn leading(reserved: u8) -> u128 {
        u128::from(reserved.min(1))
    }

    fn end(&self) -> u128 {
        let trailing = u128::from(self.reserved) - Self::leading(self.reserved);
        self.net.size().saturating_sub(trailing)
    }

    pub fn net(&self) -> P {
        self.net
    }

    /// Addresses that can be handed out over the lifetime of the block
    pub fn capacity(&self) -> u128 {
        self.end().saturating_sub(Self::leading(self.reserved))
    }

    /// Mark a static address as used so the cursor skips it.
    ///
    /// Returns false if the address lies outside of the block.
    pub fn mark_taken(&mut self, addr: &P) -> bool {
        if !self.net.covers(&addr.truncated()) {
            return false;
        }
        self.taken.insert(addr.addr_bits() - self.net.network_bits());
        true
    }

    /// Issue the next free address
    pub fn next(&mut self) -> Option<P> {
        while self.cursor < self.end() {
            let offset = self.cursor;
            self.cursor += 1;
            if !self.taken.contains(&offset) {
                return self.net.interface_at(offset);
            }
        }
        None
    }
}

/// Per-family access to interfaces and domain blocks
pub trait Family: Prefix {
    /// Number of addresses of this family the interface asks for
    fn width(intf: &Interface) -> u32;

    /// Static addresses of this family on the interface
    fn static_addresses(intf: &Interface) -> Vec<Self>;

    fn block(domain: &BroadcastDomain) -> Option<&DomainBlock<Self>>;

    fn block_mut(domain: &mut BroadcastDomain) -> &mut Option<DomainBlock<Self>>;
}

impl Family for Ipv4Net {
    fn width(intf: &Interface) -> u32 {
        intf.v4_width
    }

    fn static_addresses(intf: &Interface) -> Vec<Self> {
        intf.static_addresses
            .iter()
            .filter_map(|a| match a {
                ipnet::IpNet::V4(net) => Some(*net),
                ipnet::IpNet::V6(_) => None,
            })
            .collect()
    }

    fn block(domain: &BroadcastDomain) -> Option<&DomainBlock<Self>> {
        domain.v4.as_ref()
    }

    fn block_mut(domain: &mut BroadcastDomain) -> &mut Option<DomainBlock<Self>> {
        &mut domain.v4
    }
}

impl Family for Ipv6Net {
    fn width(intf: &Interface) -> u32 {
        intf.v6_width
    }

    fn static_addresses(intf: &Interface) -> Vec<Self> {
        intf.static_addresses
            .iter()
            .filter_map(|a| match a {
                ipnet::IpNet::V6(net) => Some(*net),
                ipnet::IpNet::V4(_) => None,
            })
            .collect()
    }

    fn block(domain: &BroadcastDomain) -> Option<&DomainBlock<Self>> {
        domain.v6.as_ref()
    }

    fn block_mut(domain: &mut BroadcastDomain) -> &mut Option<DomainBlock<Self>> {
        &mut domain.v6
    }
}

/// A maximal set of interfaces reachable without crossing a router or host
#[derive(Debug, Clone)]
pub struct BroadcastDomain {
    id: DomainId,
    interfaces: Vec<IntfId>,
    v4: Option<DomainBlock<Ipv4Net>>,
    v6: Option<DomainBlock<Ipv6Net>>,
}

impl BroadcastDomain {
    fn new(id: DomainId, interfaces: Vec<IntfId>) -> Self {
        Self {
            id,
            interfaces,
            v4: None,
            v6: None,
        }
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    /// Member interfaces, sorted
    pub fn interfaces(&self) -> &[IntfId] {
        &self.interfaces
    }

    pub fn contains(&self, intf: IntfId) -> bool {
        self.interfaces.binary_search(&intf).is_ok()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Number of addresses of family `P` the members ask for
    pub fn demand<P: Family>(&self, topo: &Topology) -> u128 {
        self.interfaces
            .iter()
            .map(|&i| u128::from(P::width(topo.interface(i))))
            .sum()
    }

    pub fn block<P: Family>(&self) -> Option<&DomainBlock<P>> {
        P::block(self)
    }

    pub fn net(&self) -> Option<Ipv4Net> {
        self.v4.as_ref().map(DomainBlock::net)
    }

    pub fn net6(&self) -> Option<Ipv6Net> {
        self.v6.as_ref().map(DomainBlock::net)
    }

    /// Bind a subnet to the domain and reset its issuance cursor
    pub fn assign<P: Family>(&mut self, block: DomainBlock<P>) {
        debug!("Broadcast domain {} gets {}", self.id, block.net());
        *P::block_mut(self) = Some(block);
    }

    /// Forget both subnets
    pub fn clear(&mut self) {
        self.v4 = None;
        self.v6 = None;
    }

    /// Issue the next address of family `P`
    pub fn next_address<P: Family>(&mut self) -> Result<P, AllocationError> {
        let id = self.id;
        let block = P::block_mut(self)
            .as_mut()
            .ok_or(AllocationError::NoSubnetAssigned {
                family: P::FAMILY,
                domain: id,
            })?;
        block
            .next()
            .ok_or_else(|| AllocationError::AddressSpaceExhausted {
                family: P::FAMILY,
                domain: id,
                net: block.net().to_string(),
            })
    }

    pub fn next_ipv4(&mut self) -> Result<Ipv4Net, AllocationError> {
        self.next_address::<Ipv4Net>()
    }

    pub fn next_ipv6(&mut self) -> Result<Ipv6Net, AllocationError> {
        self.next_address::<Ipv6Net>()
    }

    /// Member interfaces that belong to routers
    pub fn routers<'a>(&'a self, topo: &'a Topology) -> impl Iterator<Item = IntfId> + 'a {
        self.interfaces
            .iter()
            .copied()
            .filter(move |&i| topo.node_of(i).is_router())
    }

    /// Comma separated member interface names
    pub fn describe(&self, topo: &Topology) -> String {
        self.interfaces
            .iter()
            .map(|&i| topo.interface(i).name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Every broadcast domain of a topology, with an interface index
#[derive(Debug, Clone, Default)]
pub struct DomainSet {
    domains: Vec<BroadcastDomain>,
    owner: HashMap<IntfId, DomainId>,
}

impl DomainSet {
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BroadcastDomain> {
        self.domains.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BroadcastDomain> {
        self.domains.iter_mut()
    }

    pub fn get(&self, id: DomainId) -> Option<&BroadcastDomain> {
        self.domains.get(id.0)
    }

    pub fn get_mut(&mut self, id: DomainId) -> Option<&mut BroadcastDomain> {
        self.domains.get_mut(id.0)
    }

    /// The domain an interface belongs to
    pub fn domain_of(&self, intf: IntfId) -> Option<DomainId> {
        self.owner.get(&intf).copied()
    }

    pub fn domain_for(&self, intf: IntfId) -> Option<&BroadcastDomain> {
        self.domain_of(intf).and_then(|id| self.get(id))
    }
}

/// Partition every router/host interface into broadcast domains.
///
/// Nodes are scanned in insertion order, so domain numbering is stable for a
/// given topology.
pub fn compute_domains(topo: &Topology) -> DomainSet {
    let mut set = DomainSet::default();
    let boundary: Vec<IntfId> = topo
        .nodes()
        .filter(|(_, node)| node.kind.is_domain_boundary())
        .flat_map(|(_, node)| node.interfaces.iter().copied())
        .collect();

    for intf in boundary {
        if set.owner.contains_key(&intf) {
            continue;
        }
        let id = DomainId(set.domains.len());
        let members = explore(topo, intf);
        for &member in &members {
            set.owner.insert(member, id);
        }
        set.domains.push(BroadcastDomain::new(id, members));
    }
    debug!(
        "Found {} broadcast domains over {} interfaces",
        set.domains.len(),
        set.owner.len()
    );
    set
}

/// Flood from `start` across links and through switches
fn explore(topo: &Topology, start: IntfId) -> Vec<IntfId> {
    let mut members = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut to_visit = vec![start];

    while let Some(intf) = to_visit.pop() {
        if !visited.insert(intf) {
            continue;
        }
        if topo.node_of(intf).kind.is_domain_boundary() {
            members.insert(intf);
        }
        let Some(peer) = topo.peer_of(intf) else {
            continue;
        };
        if !visited.insert(peer) {
            continue;
        }
        let peer_node = topo.node_of(peer);
        if peer_node.kind.is_domain_boundary() {
            members.insert(peer);
        } else {
            to_visit.extend(peer_node.interfaces.iter().copied().filter(|&i| i != peer));
        }
    }
    members.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::AddressFamily;
    use crate::topology::LinkParams;

    #[test]
    fn test_block_reserves_network_and_broadcast() {
        let mut block = DomainBlock::new("10.0.0.0/30".parse::<Ipv4Net>().unwrap(), 2);
        assert_eq!(block.capacity(), 2);
        assert_eq!(block.next(), Some("10.0.0.1/30".parse().unwrap()));
        assert_eq!(block.next(), Some("10.0.0.2/30".parse().unwrap()));
        assert_eq!(block.next(), None);
    }

    #[test]
    fn test_block_skips_taken() {
        let mut block = DomainBlock::new("fc00::/126".parse::<Ipv6Net>().unwrap(), 1);
        assert!(block.mark_taken(&"fc00::1/126".parse().unwrap()));
        assert!(!block.mark_taken(&"fc00::10/126".parse().unwrap()));
        assert_eq!(block.capacity(), 3);
        assert_eq!(block.next(), Some("fc00::2/126".parse().unwrap()));
        assert_eq!(block.next(), Some("fc00::3/126".parse().unwrap()));
        assert_eq!(block.next(), None);
    }

    #[test]
    fn test_switch_joins_interfaces() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let h1 = topo.add_host("h1").unwrap();
        let s1 = topo.add_switch("s1").unwrap();
        topo.add_link(r1, s1, LinkParams::new());
        topo.add_link(r2, s1, LinkParams::new());
        topo.add_link(h1, s1, LinkParams::new());
        topo.add_link(r1, r2, LinkParams::new());

        let domains = compute_domains(&topo);
        assert_eq!(domains.len(), 2);
        let lan = domains.domain_for(topo.node(r1).interfaces[0]).unwrap();
        assert_eq!(lan.len(), 3);
        assert_eq!(lan.describe(&topo), "r1-eth0, r2-eth0, h1-eth0");
        assert_eq!(lan.routers(&topo).count(), 2);
        let p2p = domains.domain_for(topo.node(r1).interfaces[1]).unwrap();
        assert_eq!(p2p.len(), 2);
        assert_ne!(lan.id(), p2p.id());
    }

    #[test]
    fn test_switch_loop_terminates() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let s1 = topo.add_switch("s1").unwrap();
        let s2 = topo.add_switch("s2").unwrap();
        let s3 = topo.add_switch("s3").unwrap();
        topo.add_link(s1, s2, LinkParams::new());
        topo.add_link(s2, s3, LinkParams::new());
        topo.add_link(s3, s1, LinkParams::new());
        topo.add_link(r1, s2, LinkParams::new());

        let domains = compute_domains(&topo);
        assert_eq!(domains.len(), 1);
        assert_eq!(domains.iter().next().unwrap().len(), 1);
    }

    #[test]
    fn test_dangling_interface_is_singleton() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let intf = topo.add_interface(r1);
        let domains = compute_domains(&topo);
        assert_eq!(domains.len(), 1);
        assert_eq!(domains.domain_for(intf).unwrap().interfaces(), &[intf]);
    }

    #[test]
    fn test_next_address_without_subnet() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        topo.add_interface(r1);
        let mut domains = compute_domains(&topo);
        let domain = domains.get_mut(DomainId(0)).unwrap();
        assert_eq!(
            domain.next_ipv4(),
            Err(AllocationError::NoSubnetAssigned {
                family: AddressFamily::Ipv4,
                domain: DomainId(0)
            })
        );
        assert!(matches!(
            domain.next_ipv6(),
            Err(AllocationError::NoSubnetAssigned { family: AddressFamily::Ipv6, .. })
        ));
    }
}
