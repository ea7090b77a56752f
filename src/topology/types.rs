//! Topology type definitions.
//!
//! Nodes, interfaces and links live in the arena owned by
//! [`Topology`](super::Topology) and refer to each other through the
//! integer handles defined here.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

use crate::router::daemon::{self, Daemon};
use crate::utils::ip_utils::is_link_local_v6;

/// Default IGP cost of an interface
pub const MIN_IGP_METRIC: u32 = 1;
/// Default OSPF area of an interface
pub const OSPF_DEFAULT_AREA: &str = "0.0.0.0";

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(NodeId, "node#");
arena_id!(IntfId, "intf#");
arena_id!(LinkId, "link#");

/// Role of a node in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Router,
    Host,
    /// Layer-2 device, transparent to broadcast domains
    Switch,
}

impl NodeKind {
    /// Returns true if interfaces of this kind terminate a broadcast domain
    pub fn is_domain_boundary(self) -> bool {
        !matches!(self, Self::Switch)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router => write!(f, "router"),
            Self::Host => write!(f, "host"),
            Self::Switch => write!(f, "switch"),
        }
    }
}

/// A router, host or switch
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Interfaces in creation order
    pub interfaces: Vec<IntfId>,
    /// Autonomous system number, `None` for AS-less routers
    pub asn: Option<u32>,
    /// Loopback addresses, never part of a broadcast domain
    pub lo_addresses: Vec<IpNet>,
    pub daemons: Vec<Daemon>,
    /// Names of the BGP peers of this router
    pub bgp_peers: Vec<String>,
    /// Names of the route-reflector clients of this router
    pub rr_clients: Vec<String>,
}

impl Node {
    pub(crate) fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            interfaces: Vec::new(),
            asn: None,
            lo_addresses: Vec::new(),
            daemons: Vec::new(),
            bgp_peers: Vec::new(),
            rr_clients: Vec::new(),
        }
    }

    pub fn is_router(&self) -> bool {
        self.kind == NodeKind::Router
    }

    /// The user-configured router-id of the highest priority daemon that has one
    pub fn explicit_router_id(&self) -> Option<Ipv4Addr> {
        daemon::by_priority(&self.daemons)
            .into_iter()
            .find_map(Daemon::router_id)
    }

    /// Every user-configured router-id, whatever the daemon
    pub fn explicit_router_ids(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.daemons.iter().filter_map(Daemon::router_id)
    }

    pub fn bgp_port(&self) -> Option<u16> {
        self.daemons.iter().find_map(|d| match d {
            Daemon::Bgp(config) => Some(config.port),
            _ => None,
        })
    }
}

/// Read access to the addresses bound to an interface
pub trait HasAddresses {
    fn addresses(&self) -> &[IpNet];

    /// IPv4 addresses, in assignment order
    fn ips(&self) -> impl Iterator<Item = Ipv4Net> + '_ {
        self.addresses().iter().filter_map(|addr| match addr {
            IpNet::V4(net) => Some(*net),
            IpNet::V6(_) => None,
        })
    }

    /// IPv6 addresses, in assignment order, optionally skipping link-local ones
    fn ip6s(&self, exclude_link_local: bool) -> impl Iterator<Item = Ipv6Net> + '_ {
        self.addresses()
            .iter()
            .filter_map(|addr| match addr {
                IpNet::V6(net) => Some(*net),
                IpNet::V4(_) => None,
            })
            .filter(move |net| !(exclude_link_local && is_link_local_v6(&net.addr())))
    }

    /// Primary IPv4 address
    fn ip(&self) -> Option<Ipv4Net> {
        self.ips().next()
    }

    /// Primary non link-local IPv6 address
    fn ip6(&self) -> Option<Ipv6Net> {
        self.ip6s(true).next()
    }
}

/// A network attachment point of a node
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub node: NodeId,
    /// `None` for dangling interfaces
    pub link: Option<LinkId>,
    /// Number of IPv4 addresses to allocate
    pub v4_width: u32,
    /// Number of IPv6 addresses to allocate
    pub v6_width: u32,
    pub igp_metric: u32,
    pub igp_area: String,
    pub igp_passive: bool,
    /// User-provided addresses, kept across re-allocations
    pub static_addresses: Vec<IpNet>,
    /// Static addresses followed by allocated ones
    pub addresses: Vec<IpNet>,
}

impl HasAddresses for Interface {
    fn addresses(&self) -> &[IpNet] {
        &self.addresses
    }
}

/// A point-to-point link between two interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub intf1: IntfId,
    pub intf2: IntfId,
}

impl Link {
    /// The interface at the other end of `intf`
    pub fn other(&self, intf: IntfId) -> Option<IntfId> {
        if intf == self.intf1 {
            Some(self.intf2)
        } else if intf == self.intf2 {
            Some(self.intf1)
        } else {
            None
        }
    }
}

/// Per-interface overrides when creating a link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntfParams {
    /// Static addresses
    pub ip: Vec<IpNet>,
    pub v4_width: Option<u32>,
    pub v6_width: Option<u32>,
    pub igp_metric: Option<u32>,
    pub igp_area: Option<String>,
    pub igp_passive: Option<bool>,
}

impl IntfParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, addr: IpNet) -> Self {
        self.ip.push(addr);
        self
    }

    pub fn igp_metric(mut self, metric: u32) -> Self {
        self.igp_metric = Some(metric);
        self
    }

    pub fn igp_passive(mut self, passive: bool) -> Self {
        self.igp_passive = Some(passive);
        self
    }

    pub fn v4_width(mut self, width: u32) -> Self {
        self.v4_width = Some(width);
        self
    }

    pub fn v6_width(mut self, width: u32) -> Self {
        self.v6_width = Some(width);
        self
    }
}

/// Link-wide parameters, overridden per endpoint by `params1`/`params2`
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParams {
    pub igp_metric: Option<u32>,
    pub igp_area: Option<String>,
    pub igp_passive: bool,
    pub v4_width: u32,
    pub v6_width: u32,
    pub params1: IntfParams,
    pub params2: IntfParams,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            igp_metric: None,
            igp_area: None,
            igp_passive: false,
            v4_width: 1,
            v6_width: 1,
            params1: IntfParams::default(),
            params2: IntfParams::default(),
        }
    }
}

impl LinkParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn igp_metric(mut self, metric: u32) -> Self {
        self.igp_metric = Some(metric);
        self
    }

    pub fn igp_area(mut self, area: impl Into<String>) -> Self {
        self.igp_area = Some(area.into());
        self
    }

    pub fn igp_passive(mut self, passive: bool) -> Self {
        self.igp_passive = passive;
        self
    }

    pub fn v4_width(mut self, width: u32) -> Self {
        self.v4_width = width;
        self
    }

    pub fn v6_width(mut self, width: u32) -> Self {
        self.v6_width = width;
        self
    }

    pub fn params1(mut self, params: IntfParams) -> Self {
        self.params1 = params;
        self
    }

    pub fn params2(mut self, params: IntfParams) -> Self {
        self.params2 = params;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intf(addresses: &[&str]) -> Interface {
        let addresses: Vec<IpNet> = addresses.iter().map(|a| a.parse().unwrap()).collect();
        Interface {
            name: "r1-eth0".to_string(),
            node: NodeId(0),
            link: None,
            v4_width: 1,
            v6_width: 1,
            igp_metric: MIN_IGP_METRIC,
            igp_area: OSPF_DEFAULT_AREA.to_string(),
            igp_passive: false,
            static_addresses: Vec::new(),
            addresses,
        }
    }

    #[test]
    fn test_primary_addresses() {
        let i = intf(&["fe80::1/64", "10.0.0.1/30", "fc00::1/126", "10.0.0.5/30"]);
        assert_eq!(i.ip(), Some("10.0.0.1/30".parse().unwrap()));
        assert_eq!(i.ip6(), Some("fc00::1/126".parse().unwrap()));
        assert_eq!(i.ips().count(), 2);
        assert_eq!(i.ip6s(false).count(), 2);
    }

    #[test]
    fn test_no_global_ipv6() {
        let i = intf(&["fe80::1/64"]);
        assert_eq!(i.ip6(), None);
        assert_eq!(i.ip(), None);
    }

    #[test]
    fn test_link_other_end() {
        let link = Link {
            intf1: IntfId(3),
            intf2: IntfId(7),
        };
        assert_eq!(link.other(IntfId(3)), Some(IntfId(7)));
        assert_eq!(link.other(IntfId(7)), Some(IntfId(3)));
        assert_eq!(link.other(IntfId(1)), None);
    }

    #[test]
    fn test_switch_is_not_boundary() {
        assert!(NodeKind::Router.is_domain_boundary());
        assert!(NodeKind::Host.is_domain_boundary());
        assert!(!NodeKind::Switch.is_domain_boundary());
    }
}
