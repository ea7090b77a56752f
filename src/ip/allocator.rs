//! Subnet allocation and per-interface address issuance.
//!
//! Allocation runs once per address family. Domains holding static
//! addresses keep the network of their first static address; every other
//! domain with a non-zero demand receives a block carved from the pool,
//! largest demand first so big blocks are not fragmented by small ones.

use ipnet::IpNet;
use log::{debug, info, warn};

use super::address_space::{required_prefix_len, AddressSpace, Prefix};
use super::domain::{DomainBlock, DomainId, DomainSet, Family};
use super::error::{AllocationError, ExhaustionCause};
use super::registry::AddressRegistry;
use crate::topology::Topology;

/// Sizing rules of one address family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySettings {
    /// Shortest prefix length a domain may receive
    pub max_prefix_len: u8,
    /// Longest prefix length a domain may receive, if set
    pub block_prefix_len: Option<u8>,
    /// Addresses of each block that are never issued
    pub reserved: u8,
}

/// Bind a subnet of family `P` to every broadcast domain that needs one.
///
/// Fails with [`AllocationError::AddressExhaustion`] when a domain needs a
/// block larger than `max_prefix_len` allows or when the pool has no block
/// left that is large enough, the cause telling both apart.
pub fn allocate_subnets<P: Family>(
    topo: &Topology,
    domains: &mut DomainSet,
    pool: &mut AddressSpace<P>,
    settings: &FamilySettings,
) -> Result<(), AllocationError> {
    pin_static_blocks::<P>(topo, domains, pool, settings)?;

    let mut pending: Vec<(DomainId, u128)> = domains
        .iter()
        .filter(|d| d.block::<P>().is_none())
        .map(|d| (d.id(), d.demand::<P>(topo)))
        .filter(|&(_, demand)| demand > 0)
        .collect();
    // Stable sort keeps discovery order among equal demands
    pending.sort_by(|a, b| b.1.cmp(&a.1));

    for (id, demand) in pending {
        let Some(domain) = domains.get_mut(id) else {
            continue;
        };
        let needed = required_prefix_len::<P>(demand, settings.reserved);
        let needed = match needed {
            Some(plen) if plen >= settings.max_prefix_len => plen,
            _ => {
                return Err(AllocationError::AddressExhaustion {
                    family: P::FAMILY,
                    domain: id,
                    members: domain.describe(topo),
                    required: demand,
                    prefix_len: needed.unwrap_or(0),
                    cause: ExhaustionCause::AboveCap {
                        cap: settings.max_prefix_len,
                    },
                })
            }
        };
        let plen = settings
            .block_prefix_len
            .map_or(needed, |floor| needed.min(floor));
        let net = pool
            .carve(plen)
            .ok_or_else(|| AllocationError::AddressExhaustion {
                family: P::FAMILY,
                domain: id,
                members: domain.describe(topo),
                required: demand,
                prefix_len: plen,
                cause: ExhaustionCause::PoolDepleted,
            })?;
        debug!(
            "Allocated {} to broadcast domain {} [{}] for {} addresses",
            net,
            id,
            domain.describe(topo),
            demand
        );
        domain.assign(DomainBlock::new(net, settings.reserved));
    }
    Ok(())
}

/// Give domains with static addresses the network of their first one
fn pin_static_blocks<P: Family>(
    topo: &Topology,
    domains: &mut DomainSet,
    pool: &mut AddressSpace<P>,
    settings: &FamilySettings,
) -> Result<(), AllocationError> {
    let mut pinned: Vec<(P, DomainId)> = Vec::new();

    for domain in domains.iter_mut() {
        let statics: Vec<P> = domain
            .interfaces()
            .iter()
            .flat_map(|&i| P::static_addresses(topo.interface(i)))
            .collect();
        let Some(first) = statics.first() else {
            continue;
        };
        let net = first.truncated();
        if let Some((other, other_domain)) = pinned
            .iter()
            .find(|(other, _)| other.covers(&net) || net.covers(other))
        {
            return Err(AllocationError::OverlappingSubnets {
                net: net.to_string(),
                domain: domain.id(),
                other: other.to_string(),
                other_domain: *other_domain,
            });
        }
        if !pool.reserve(net) {
            debug!("Static subnet {} lies outside of the allocation pool", net);
        }

        let mut block = DomainBlock::new(net, settings.reserved);
        for addr in &statics {
            if !block.mark_taken(addr) {
                warn!(
                    "Static address {} is outside of {} used by broadcast domain {}",
                    addr,
                    net,
                    domain.id()
                );
            }
        }
        pinned.push((net, domain.id()));
        domain.assign(block);
    }
    Ok(())
}

/// Issue addresses of family `P` to every interface from its domain's block.
///
/// Interfaces holding a static address of the family keep it and receive
/// nothing else. Every address, static or issued, is recorded in `registry`.
pub fn assign_addresses<P: Family>(
    topo: &mut Topology,
    domains: &mut DomainSet,
    registry: &mut AddressRegistry,
) -> Result<(), AllocationError> {
    let mut issued = 0usize;
    for domain in domains.iter_mut() {
        for intf in domain.interfaces().to_vec() {
            let node = topo.interface(intf).node;
            let statics = P::static_addresses(topo.interface(intf));
            if !statics.is_empty() {
                for addr in statics {
                    registry.register(addr.into_ip_net().addr(), node, &topo.node(node).name)?;
                }
                continue;
            }
            for _ in 0..P::width(topo.interface(intf)) {
                let addr = domain.next_address::<P>()?;
                registry.register(addr.into_ip_net().addr(), node, &topo.node(node).name)?;
                topo.interface_mut(intf).addresses.push(addr.into_ip_net());
                issued += 1;
            }
        }
    }
    info!("Issued {} {} addresses", issued, P::FAMILY);
    Ok(())
}

/// Record static addresses of family `P` without allocating anything
pub fn register_static<P: Family>(topo: &Topology, registry: &mut AddressRegistry) -> Result<(), AllocationError> {
    for (_, intf) in topo.interfaces() {
        for addr in P::static_addresses(intf) {
            registry.register(addr.into_ip_net().addr(), intf.node, &topo.node(intf.node).name)?;
        }
    }
    Ok(())
}

/// Record loopback addresses of every node
pub fn register_loopbacks(topo: &Topology, registry: &mut AddressRegistry) -> Result<(), AllocationError> {
    for (id, node) in topo.nodes() {
        for addr in &node.lo_addresses {
            registry.register(IpNet::addr(addr), id, &node.name)?;
        }
    }
    Ok(())
}
