//! Node/interface/link arena.
//!
//! The [`Topology`] owns every node, interface and link of a network. Nodes
//! are looked up by name, everything else through the handles from
//! [`types`](super::types).

use std::collections::HashMap;

use log::debug;

use super::types::{
    Interface, IntfId, IntfParams, Link, LinkId, LinkParams, Node, NodeId, NodeKind,
    MIN_IGP_METRIC, OSPF_DEFAULT_AREA,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Node name '{name}' is used twice")]
    DuplicateNode { name: String },

    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("Node '{name}' is a {kind}, expected a router")]
    NotARouter { name: String, kind: NodeKind },

    #[error("Node '{name}' is a {kind}, expected a host")]
    NotAHost { name: String, kind: NodeKind },

    #[error("No link between '{a}' and '{b}'")]
    NoSuchLink { a: String, b: String },

    #[error("Subnet {prefix} has no address left for interface {interface}")]
    SubnetTooSmall { prefix: String, interface: String },
}

/// The network graph
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    interfaces: Vec<Interface>,
    links: Vec<Link>,
    names: HashMap<String, NodeId>,
    igp_metric: u32,
    igp_area: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    pub fn new() -> Self {
        Self::with_igp_defaults(MIN_IGP_METRIC, OSPF_DEFAULT_AREA)
    }

    /// Create an empty topology whose interfaces default to the given IGP settings
    pub fn with_igp_defaults(igp_metric: u32, igp_area: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            interfaces: Vec::new(),
            links: Vec::new(),
            names: HashMap::new(),
            igp_metric,
            igp_area: igp_area.into(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> Result<NodeId, TopologyError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateNode { name });
        }
        let id = NodeId(self.nodes.len());
        debug!("Adding {} {} as {}", kind, name, id);
        self.names.insert(name.clone(), id);
        self.nodes.push(Node::new(name, kind));
        Ok(id)
    }

    pub fn add_router(&mut self, name: impl Into<String>) -> Result<NodeId, TopologyError> {
        self.add_node(name, NodeKind::Router)
    }

    pub fn add_host(&mut self, name: impl Into<String>) -> Result<NodeId, TopologyError> {
        self.add_node(name, NodeKind::Host)
    }

    pub fn add_switch(&mut self, name: impl Into<String>) -> Result<NodeId, TopologyError> {
        self.add_node(name, NodeKind::Switch)
    }

    /// Add an unconnected interface to `node`
    pub fn add_interface(&mut self, node: NodeId) -> IntfId {
        let id = IntfId(self.interfaces.len());
        let owner = &mut self.nodes[node.0];
        let name = format!("{}-eth{}", owner.name, owner.interfaces.len());
        owner.interfaces.push(id);
        self.interfaces.push(Interface {
            name,
            node,
            link: None,
            v4_width: 1,
            v6_width: 1,
            igp_metric: self.igp_metric,
            igp_area: self.igp_area.clone(),
            igp_passive: false,
            static_addresses: Vec::new(),
            addresses: Vec::new(),
        });
        id
    }

    /// Connect `a` and `b` with a new link, creating one interface on each side
    pub fn add_link(&mut self, a: NodeId, b: NodeId, params: LinkParams) -> LinkId {
        let intf1 = self.add_interface(a);
        let intf2 = self.add_interface(b);
        let id = LinkId(self.links.len());
        self.links.push(Link { intf1, intf2 });

        for (intf, overrides) in [(intf1, &params.params1), (intf2, &params.params2)] {
            self.configure_interface(intf, id, &params, overrides);
        }
        debug!(
            "Linked {} and {}",
            self.interfaces[intf1.0].name, self.interfaces[intf2.0].name
        );
        id
    }

    pub fn add_link_by_name(&mut self, a: &str, b: &str, params: LinkParams) -> Result<LinkId, TopologyError> {
        let a = self.require_node(a)?;
        let b = self.require_node(b)?;
        Ok(self.add_link(a, b, params))
    }

    fn configure_interface(&mut self, intf: IntfId, link: LinkId, params: &LinkParams, overrides: &IntfParams) {
        let default_metric = self.igp_metric;
        let default_area = &self.igp_area;
        let interface = &mut self.interfaces[intf.0];
        interface.link = Some(link);
        interface.v4_width = overrides.v4_width.unwrap_or(params.v4_width);
        interface.v6_width = overrides.v6_width.unwrap_or(params.v6_width);
        interface.igp_metric = overrides
            .igp_metric
            .or(params.igp_metric)
            .unwrap_or(default_metric);
        interface.igp_area = overrides
            .igp_area
            .clone()
            .or_else(|| params.igp_area.clone())
            .unwrap_or_else(|| default_area.clone());
        interface.igp_passive = overrides.igp_passive.unwrap_or(params.igp_passive);
        interface.static_addresses = overrides.ip.clone();
        interface.addresses = overrides.ip.clone();
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn interface(&self, id: IntfId) -> &Interface {
        &self.interfaces[id.0]
    }

    pub fn interface_mut(&mut self, id: IntfId) -> &mut Interface {
        &mut self.interfaces[id.0]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Look up a node by name, failing on unknown names
    pub fn require_node(&self, name: &str) -> Result<NodeId, TopologyError> {
        self.node_id(name).ok_or_else(|| TopologyError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// Look up a router by name, failing on unknown names and non-routers
    pub fn require_router(&self, name: &str) -> Result<NodeId, TopologyError> {
        let id = self.require_node(name)?;
        let node = self.node(id);
        if !node.is_router() {
            return Err(TopologyError::NotARouter {
                name: name.to_string(),
                kind: node.kind,
            });
        }
        Ok(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn interfaces(&self) -> impl Iterator<Item = (IntfId, &Interface)> {
        self.interfaces
            .iter()
            .enumerate()
            .map(|(i, intf)| (IntfId(i), intf))
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    pub fn routers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_of_kind(NodeKind::Router)
    }

    pub fn hosts(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_of_kind(NodeKind::Host)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes()
            .filter(move |(_, n)| n.kind == kind)
            .map(|(id, _)| id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// The node owning `intf`
    pub fn node_of(&self, intf: IntfId) -> &Node {
        self.node(self.interface(intf).node)
    }

    /// The interface at the other end of the link of `intf`
    pub fn peer_of(&self, intf: IntfId) -> Option<IntfId> {
        let link = self.interface(intf).link?;
        self.link(link).other(intf)
    }

    /// Links directly connecting `a` and `b`, in creation order
    pub fn links_between(&self, a: NodeId, b: NodeId) -> Vec<LinkId> {
        self.links()
            .filter(|(_, link)| {
                let n1 = self.interface(link.intf1).node;
                let n2 = self.interface(link.intf2).node;
                (n1 == a && n2 == b) || (n1 == b && n2 == a)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Drop every allocated address, keeping only static ones
    pub fn reset_addresses(&mut self) {
        for interface in &mut self.interfaces {
            interface.addresses = interface.static_addresses.clone();
        }
    }
}
