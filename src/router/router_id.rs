//! Router-id selection.
//!
//! A router takes, in order: the router-id set on its highest priority
//! daemon, the most visible IPv4 address of its interfaces, or the next
//! free value of a counter shared by the whole network. Fallback values are
//! checked against every router reachable through broadcast domains, so two
//! routers that can exchange routing messages never share an identifier.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;
use log::debug;

use crate::ip::DomainSet;
use crate::topology::{HasAddresses, NodeId, Topology};
use crate::utils::ip_utils::most_visible;

/// First identifier handed out by the fallback counter
pub const ROUTER_ID_SEED: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterIdError {
    #[error("Router-id space exhausted while looking for an identifier for {router}")]
    Exhausted { router: String },

    #[error("{name} is not a router and has no router-id")]
    NotARouter { name: String },
}

/// The most visible IPv4 address of the interfaces of `node`
pub fn most_visible_ipv4(topo: &Topology, node: NodeId) -> Option<Ipv4Addr> {
    let candidates = topo
        .node(node)
        .interfaces
        .iter()
        .flat_map(|&i| topo.interface(i).ips().map(IpNet::V4).collect::<Vec<_>>());
    match most_visible(candidates)?.addr() {
        IpAddr::V4(addr) => Some(addr),
        IpAddr::V6(_) => None,
    }
}

/// Routers reachable from `start` by hopping across broadcast domains,
/// in discovery order, `start` excluded. Hosts and switches are never
/// traversed.
pub fn reachable_routers(topo: &Topology, domains: &DomainSet, start: NodeId) -> Vec<NodeId> {
    let mut seen: HashSet<NodeId> = HashSet::from([start]);
    let mut found = Vec::new();
    let mut to_visit: Vec<NodeId> = vec![start];

    while let Some(node) = to_visit.pop() {
        for &intf in &topo.node(node).interfaces {
            let Some(domain) = domains.domain_for(intf) else {
                continue;
            };
            for member in domain.routers(topo) {
                let router = topo.interface(member).node;
                if seen.insert(router) {
                    found.push(router);
                    to_visit.push(router);
                }
            }
        }
    }
    found
}

/// Hands out router-ids and remembers them
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
    assigned: HashMap<NodeId, Ipv4Addr>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::with_seed(ROUTER_ID_SEED)
    }

    /// Start the fallback counter at `seed`
    pub fn with_seed(seed: Ipv4Addr) -> Self {
        Self {
            next: u64::from(u32::from(seed)),
            assigned: HashMap::new(),
        }
    }

    /// The identifier already computed for `router`
    pub fn get(&self, router: NodeId) -> Option<Ipv4Addr> {
        self.assigned.get(&router).copied()
    }

    /// Forget every computed identifier and restart the counter at `seed`
    pub fn reset(&mut self, seed: Ipv4Addr) {
        *self = Self::with_seed(seed);
    }

    /// Compute the router-id of `router`.
    ///
    /// Results are cached: asking twice for the same router returns the same
    /// value and does not advance the fallback counter.
    pub fn compute_router_id(
        &mut self,
        topo: &Topology,
        domains: &DomainSet,
        router: NodeId,
    ) -> Result<Ipv4Addr, RouterIdError> {
        if let Some(id) = self.get(router) {
            return Ok(id);
        }
        let node = topo.node(router);
        if !node.is_router() {
            return Err(RouterIdError::NotARouter {
                name: node.name.clone(),
            });
        }

        let id = match node.explicit_router_id() {
            Some(id) => id,
            None => match most_visible_ipv4(topo, router) {
                Some(id) => id,
                None => self.fallback(topo, domains, router)?,
            },
        };
        debug!("Router-id of {} is {}", node.name, id);
        self.assigned.insert(router, id);
        Ok(id)
    }

    /// Whether `node` uses or would use `candidate` as router-id
    fn claims(&self, topo: &Topology, node: NodeId, candidate: Ipv4Addr) -> bool {
        if let Some(id) = self.get(node) {
            return id == candidate;
        }
        topo.node(node).explicit_router_ids().any(|id| id == candidate)
            || most_visible_ipv4(topo, node) == Some(candidate)
    }

    fn fallback(&mut self, topo: &Topology, domains: &DomainSet, router: NodeId) -> Result<Ipv4Addr, RouterIdError> {
        let reachable = reachable_routers(topo, domains, router);
        let exhausted = || RouterIdError::Exhausted {
            router: topo.node(router).name.clone(),
        };

        loop {
            let value = u32::try_from(self.next).map_err(|_| exhausted())?;
            let candidate = Ipv4Addr::from(value);
            self.next += 1;
            match reachable.iter().find(|&&n| self.claims(topo, n, candidate)) {
                Some(&owner) => debug!(
                    "Router-id {} is taken by {}, trying the next one",
                    candidate,
                    topo.node(owner).name
                ),
                None => return Ok(candidate),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::compute_domains;
    use crate::router::daemon::{Daemon, OspfConfig};
    use crate::topology::{IntfParams, LinkParams};

    fn ospf_with_id(id: Ipv4Addr) -> Daemon {
        Daemon::Ospf(OspfConfig {
            router_id: Some(id),
            ..OspfConfig::default()
        })
    }

    #[test]
    fn test_isolated_router_gets_seed() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::new();
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::new(0, 0, 0, 1))
        );
        // Cached, counter untouched
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::new(0, 0, 0, 1))
        );
    }

    #[test]
    fn test_explicit_id_wins() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        topo.add_link(
            r1,
            r2,
            LinkParams::new().params1(IntfParams::new().address("10.0.0.1/30".parse().unwrap())),
        );
        topo.node_mut(r1).daemons.push(ospf_with_id(Ipv4Addr::new(9, 9, 9, 9)));
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::new();
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::new(9, 9, 9, 9))
        );
    }

    #[test]
    fn test_most_visible_address() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let r3 = topo.add_router("r3").unwrap();
        topo.add_link(
            r1,
            r2,
            LinkParams::new().params1(IntfParams::new().address("10.0.0.1/30".parse().unwrap())),
        );
        topo.add_link(
            r1,
            r3,
            LinkParams::new().params1(IntfParams::new().address("192.168.7.1/24".parse().unwrap())),
        );
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::new();
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::new(192, 168, 7, 1))
        );
    }

    #[test]
    fn test_fallback_skips_conflicts() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let r3 = topo.add_router("r3").unwrap();
        let s1 = topo.add_switch("s1").unwrap();
        for r in [r1, r2, r3] {
            topo.add_link(r, s1, LinkParams::new());
        }
        topo.node_mut(r2).daemons.push(ospf_with_id(Ipv4Addr::new(0, 0, 0, 1)));
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::new();

        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::new(0, 0, 0, 2))
        );
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r3),
            Ok(Ipv4Addr::new(0, 0, 0, 3))
        );
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r2),
            Ok(Ipv4Addr::new(0, 0, 0, 1))
        );
    }

    #[test]
    fn test_reachability_stops_at_hosts() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let h1 = topo.add_host("h1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        topo.add_link(r1, h1, LinkParams::new());
        topo.add_link(h1, r2, LinkParams::new());
        let domains = compute_domains(&topo);
        assert!(reachable_routers(&topo, &domains, r1).is_empty());
    }

    #[test]
    fn test_counter_exhaustion() {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let r2 = topo.add_router("r2").unwrap();
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::with_seed(Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(
            ids.compute_router_id(&topo, &domains, r1),
            Ok(Ipv4Addr::BROADCAST)
        );
        assert!(matches!(
            ids.compute_router_id(&topo, &domains, r2),
            Err(RouterIdError::Exhausted { .. })
        ));
    }

    #[test]
    fn test_host_has_no_router_id() {
        let mut topo = Topology::new();
        let h1 = topo.add_host("h1").unwrap();
        let domains = compute_domains(&topo);
        let mut ids = IdAllocator::new();
        assert!(matches!(
            ids.compute_router_id(&topo, &domains, h1),
            Err(RouterIdError::NotARouter { .. })
        ));
    }
}
