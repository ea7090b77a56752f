//! Network orchestrator.
//!
//! A [`Network`] owns a topology and drives the allocation phases over it:
//! broadcast domain discovery, subnet allocation, address issuance and
//! router identification. Queries on peers, gateways and address owners are
//! answered from the resulting state.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use log::{debug, info};

use crate::config::{Config, NetworkSettings};
use crate::config_loader::build_topology;
use crate::error::NetworkError;
use crate::ip::allocator::{register_loopbacks, register_static};
use crate::ip::{
    allocate_subnets, assign_addresses, compute_domains, AddressRegistry, AddressSpace,
    DomainSet, Family, FamilySettings,
};
use crate::plan::{
    DaemonPlan, DomainPlan, Gateway, HostPlan, InterfacePlan, NetworkPlan, PoolPlan, RouterPlan,
};
use crate::router::daemon::by_priority;
use crate::router::{bgp, find_peer_address, BgpNeighbor, IdAllocator, PeerAddress};
use crate::topology::{HasAddresses, NodeId, NodeKind, Topology, TopologyError};

#[derive(Debug, Clone)]
pub struct Network {
    topology: Topology,
    settings: NetworkSettings,
    domains: DomainSet,
    pool_v4: AddressSpace<Ipv4Net>,
    pool_v6: AddressSpace<Ipv6Net>,
    registry: AddressRegistry,
    ids: IdAllocator,
    built: bool,
}

impl Network {
    pub fn new(topology: Topology, settings: NetworkSettings) -> Self {
        let ids = IdAllocator::with_seed(settings.router_id_seed);
        Self {
            topology,
            settings,
            domains: DomainSet::default(),
            pool_v4: AddressSpace::empty(),
            pool_v6: AddressSpace::empty(),
            registry: AddressRegistry::new(),
            ids,
            built: false,
        }
    }

    /// Build the topology of a validated configuration, overlays applied
    pub fn from_config(config: &Config) -> Result<Self, NetworkError> {
        config.validate()?;
        let topology = build_topology(config)?;
        Ok(Self::new(topology, config.network.clone()))
    }

    /// Discover broadcast domains, allocate subnets and issue addresses.
    ///
    /// Running it again starts over from static addresses only.
    pub fn build(&mut self) -> Result<(), NetworkError> {
        self.settings.validate()?;
        self.built = false;

        info!("Computing broadcast domains");
        self.domains = compute_domains(&self.topology);
        info!(
            "Found {} broadcast domains over {} nodes and {} interfaces",
            self.domains.len(),
            self.topology.node_count(),
            self.topology.interface_count()
        );

        self.topology.reset_addresses();
        self.registry.clear();
        self.ids.reset(self.settings.router_id_seed);
        self.pool_v4 = if self.settings.use_v4 {
            AddressSpace::new(self.settings.ip_base)
        } else {
            AddressSpace::empty()
        };
        self.pool_v6 = if self.settings.use_v6 {
            AddressSpace::new(self.settings.ip6_base)
        } else {
            AddressSpace::empty()
        };

        let allocate = self.settings.allocate_ips;
        if allocate && self.settings.use_v4 {
            info!("Allocating IPv4 subnets from {}", self.settings.ip_base);
            let settings = self.settings.v4();
            allocate_family(
                &mut self.topology,
                &mut self.domains,
                &mut self.pool_v4,
                &mut self.registry,
                &settings,
            )?;
        } else {
            register_static::<Ipv4Net>(&self.topology, &mut self.registry)?;
        }
        if allocate && self.settings.use_v6 {
            info!("Allocating IPv6 subnets from {}", self.settings.ip6_base);
            let settings = self.settings.v6();
            allocate_family(
                &mut self.topology,
                &mut self.domains,
                &mut self.pool_v6,
                &mut self.registry,
                &settings,
            )?;
        } else {
            register_static::<Ipv6Net>(&self.topology, &mut self.registry)?;
        }
        register_loopbacks(&self.topology, &mut self.registry)?;

        let (v4, v6) = self.registry.allocation_stats();
        info!("Network built: {} IPv4 and {} IPv6 addresses in use", v4, v6);
        debug!(
            "Left in the pools: {} IPv4 and {} IPv6 addresses",
            self.pool_v4.available(),
            self.pool_v6.available()
        );
        self.built = true;
        Ok(())
    }

    fn ensure_built(&self) -> Result<(), NetworkError> {
        if self.built {
            Ok(())
        } else {
            Err(NetworkError::NotBuilt)
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub fn domains(&self) -> &DomainSet {
        &self.domains
    }

    pub fn pool_v4(&self) -> &AddressSpace<Ipv4Net> {
        &self.pool_v4
    }

    pub fn pool_v6(&self) -> &AddressSpace<Ipv6Net> {
        &self.pool_v6
    }

    /// Name of the node owning `ip`
    pub fn node_for_ip(&self, ip: &IpAddr) -> Option<&str> {
        self.registry.name_of(ip)
    }

    fn router(&self, name: &str) -> Result<NodeId, NetworkError> {
        Ok(self.topology.require_router(name)?)
    }

    /// Router-id of the router called `name`
    pub fn router_id(&mut self, name: &str) -> Result<Ipv4Addr, NetworkError> {
        self.ensure_built()?;
        let id = self.router(name)?;
        Ok(self.ids.compute_router_id(&self.topology, &self.domains, id)?)
    }

    /// Address of router `target` as reached from router `base`
    pub fn find_peer_address(
        &self,
        base: &str,
        target: &str,
        want_ipv6: bool,
    ) -> Result<Option<PeerAddress>, NetworkError> {
        self.ensure_built()?;
        let base = self.router(base)?;
        Ok(find_peer_address(&self.topology, &self.domains, base, target, want_ipv6))
    }

    /// BGP sessions of the router called `name`
    pub fn bgp_neighbors(&self, name: &str) -> Result<Vec<BgpNeighbor>, NetworkError> {
        self.ensure_built()?;
        let id = self.router(name)?;
        Ok(bgp::bgp_neighbors(&self.topology, &self.domains, id))
    }

    /// First router met in the broadcast domains of the host called `name`
    pub fn default_gateway(&self, name: &str) -> Result<Option<Gateway>, NetworkError> {
        self.ensure_built()?;
        let host = self.topology.require_node(name)?;
        if self.topology.node(host).kind != NodeKind::Host {
            return Err(TopologyError::NotAHost {
                name: name.to_string(),
                kind: self.topology.node(host).kind,
            }
            .into());
        }
        Ok(self.gateway_of(host))
    }

    fn gateway_of(&self, host: NodeId) -> Option<Gateway> {
        self.topology.node(host).interfaces.iter().find_map(|&intf| {
            let domain = self.domains.domain_for(intf)?;
            let gateway = domain.routers(&self.topology).next()?;
            let interface = self.topology.interface(gateway);
            Some(Gateway {
                router: self.topology.node(interface.node).name.clone(),
                ipv4: interface.ip().map(|net| net.addr()),
                ipv6: interface.ip6().map(|net| net.addr()),
            })
        })
    }

    /// Snapshot of the allocation, computing router-ids on the way
    pub fn plan(&mut self) -> Result<NetworkPlan, NetworkError> {
        self.ensure_built()?;
        let topo = &self.topology;

        let domains = self
            .domains
            .iter()
            .map(|d| DomainPlan {
                id: d.id().0,
                ipv4: d.net(),
                ipv6: d.net6(),
                members: d
                    .interfaces()
                    .iter()
                    .map(|&i| topo.interface(i).name.clone())
                    .collect(),
            })
            .collect();

        let interfaces = topo
            .interfaces()
            .map(|(_, intf)| InterfacePlan {
                name: intf.name.clone(),
                node: topo.node(intf.node).name.clone(),
                addresses: intf.addresses.clone(),
                igp_metric: intf.igp_metric,
                igp_area: intf.igp_area.clone(),
                igp_passive: intf.igp_passive,
            })
            .collect();

        let mut routers = Vec::new();
        for id in topo.routers() {
            let node = topo.node(id);
            let router_id = self.ids.compute_router_id(topo, &self.domains, id)?;
            routers.push(RouterPlan {
                name: node.name.clone(),
                router_id,
                asn: node.asn,
                daemons: by_priority(&node.daemons)
                    .into_iter()
                    .map(DaemonPlan::from)
                    .collect(),
                loopbacks: node.lo_addresses.clone(),
                bgp_neighbors: bgp::bgp_neighbors(topo, &self.domains, id),
                rr_clients: bgp::rr_clients(topo, &self.domains, id),
            });
        }

        let hosts = topo
            .hosts()
            .map(|id| HostPlan {
                name: topo.node(id).name.clone(),
                gateway: self.gateway_of(id),
            })
            .collect();

        Ok(NetworkPlan {
            domains,
            interfaces,
            routers,
            hosts,
            pools: PoolPlan {
                ipv4: self.pool_v4.blocks().to_vec(),
                ipv6: self.pool_v6.blocks().to_vec(),
            },
        })
    }
}

fn allocate_family<P: Family>(
    topo: &mut Topology,
    domains: &mut DomainSet,
    pool: &mut AddressSpace<P>,
    registry: &mut AddressRegistry,
    settings: &FamilySettings,
) -> Result<(), NetworkError> {
    allocate_subnets::<P>(topo, domains, pool, settings)?;
    assign_addresses::<P>(topo, domains, registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::LinkParams;

    fn lan() -> Network {
        let mut topo = Topology::new();
        let r1 = topo.add_router("r1").unwrap();
        let h1 = topo.add_host("h1").unwrap();
        let s1 = topo.add_switch("s1").unwrap();
        topo.add_link(h1, s1, LinkParams::new());
        topo.add_link(r1, s1, LinkParams::new());
        Network::new(topo, NetworkSettings::default())
    }

    #[test]
    fn test_queries_require_build() {
        let mut net = lan();
        assert!(matches!(net.router_id("r1"), Err(NetworkError::NotBuilt)));
        net.build().unwrap();
        assert!(net.router_id("r1").is_ok());
    }

    #[test]
    fn test_default_gateway() {
        let mut net = lan();
        net.build().unwrap();
        let gateway = net.default_gateway("h1").unwrap().unwrap();
        assert_eq!(gateway.router, "r1");
        // h1 comes first in the domain so r1 gets the second address
        assert_eq!(gateway.ipv4, Some(Ipv4Addr::new(192, 168, 0, 2)));
        assert!(gateway.ipv6.is_some());
        assert!(net.default_gateway("r1").is_err());
    }

    #[test]
    fn test_node_for_ip() {
        let mut net = lan();
        net.build().unwrap();
        assert_eq!(net.node_for_ip(&"192.168.0.1".parse().unwrap()), Some("h1"));
        assert_eq!(net.node_for_ip(&"192.168.0.2".parse().unwrap()), Some("r1"));
        assert_eq!(net.node_for_ip(&"192.168.0.3".parse().unwrap()), None);
    }

    #[test]
    fn test_rebuild_is_stable() {
        let mut net = lan();
        net.build().unwrap();
        let first = net.plan().unwrap();
        net.build().unwrap();
        assert_eq!(net.plan().unwrap(), first);
    }

    #[test]
    fn test_static_only() {
        let mut net = lan();
        net.settings = NetworkSettings::default().allocate_ips(false);
        net.build().unwrap();
        let plan = net.plan().unwrap();
        assert!(plan.interfaces.iter().all(|i| i.addresses.is_empty()));
        assert_eq!(plan.pools.ipv4, vec!["192.168.0.0/16".parse::<Ipv4Net>().unwrap()]);
    }
}
