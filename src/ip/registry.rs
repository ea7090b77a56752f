//! IP address registry.
//!
//! Records the node owning every address bound in the network so that
//! addresses stay unique and can be mapped back to their node.

use std::collections::HashMap;
use std::net::IpAddr;

use super::error::AllocationError;
use crate::topology::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    node: NodeId,
    name: String,
}

/// Address to node index
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    owners: HashMap<IpAddr, Owner>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` owns `ip`.
    ///
    /// Registering the same address twice for the same node is accepted,
    /// registering it for another node fails.
    pub fn register(&mut self, ip: IpAddr, node: NodeId, name: &str) -> Result<(), AllocationError> {
        if let Some(existing) = self.owners.get(&ip) {
            if existing.node != node {
                return Err(AllocationError::DuplicateAddress {
                    address: ip,
                    first: existing.name.clone(),
                    second: name.to_string(),
                });
            }
            return Ok(());
        }
        self.owners.insert(
            ip,
            Owner {
                node,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Name of the node owning `ip`
    pub fn name_of(&self, ip: &IpAddr) -> Option<&str> {
        self.owners.get(ip).map(|o| o.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Number of registered (IPv4, IPv6) addresses
    pub fn allocation_stats(&self) -> (usize, usize) {
        let v4 = self.owners.keys().filter(|ip| ip.is_ipv4()).count();
        (v4, self.owners.len() - v4)
    }
}
