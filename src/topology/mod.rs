//! Network topology module.
//!
//! This module contains the node/interface/link graph of an emulated
//! network and the overlays that decorate it before address allocation.

pub mod graph;
pub mod overlay;
pub mod types;

// Re-export key types for easier access
pub use graph::{Topology, TopologyError};
pub use overlay::{Overlay, SubnetReservation};
pub use types::{
    HasAddresses, Interface, IntfId, IntfParams, Link, LinkId, LinkParams, Node, NodeId,
    NodeKind,
};
