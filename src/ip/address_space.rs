//! Pools of unallocated supernets.
//!
//! An [`AddressSpace`] starts from one base prefix and is carved into
//! exact-size blocks by binary subdivision. Blocks in the pool never overlap
//! and the pool only ever shrinks or splits.

use std::fmt;
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// IPv4 addresses withheld per subnet: network and broadcast
pub const V4_RESERVED: u8 = 2;
/// IPv6 addresses withheld per subnet: the subnet-router anycast address
pub const V6_RESERVED: u8 = 1;

/// Number of addresses in a block with `host_bits` host bits, saturating at `u128::MAX`
pub fn block_size(host_bits: u32) -> u128 {
    1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
}

/// A network prefix of one address family.
///
/// Values double as interface addresses: the carried address may have host
/// bits set while [`Prefix::network_bits`] always yields the masked network.
pub trait Prefix: Copy + Eq + Hash + fmt::Debug + fmt::Display {
    const FAMILY: AddressFamily;
    const BITS: u8;

    fn prefix_len(&self) -> u8;

    /// The network address as an integer
    fn network_bits(&self) -> u128;

    /// The carried address as an integer
    fn addr_bits(&self) -> u128;

    /// The address at `offset` inside this network, with this prefix length
    fn interface_at(&self, offset: u128) -> Option<Self>;

    /// Split in two halves of `prefix_len + 1`, lower half first
    fn halves(&self) -> Option<(Self, Self)>;

    /// Whether `other` lies entirely inside this network
    fn covers(&self, other: &Self) -> bool;

    /// The same prefix with host bits cleared
    fn truncated(&self) -> Self;

    fn into_ip_net(self) -> IpNet;

    /// Number of addresses in the network
    fn size(&self) -> u128 {
        block_size(u32::from(Self::BITS - self.prefix_len()))
    }
}

impl Prefix for Ipv4Net {
    const FAMILY: AddressFamily = AddressFamily::Ipv4;
    const BITS: u8 = 32;

    fn prefix_len(&self) -> u8 {
        Ipv4Net::prefix_len(self)
    }

    fn network_bits(&self) -> u128 {
        u128::from(u32::from(self.network()))
    }

    fn addr_bits(&self) -> u128 {
        u128::from(u32::from(self.addr()))
    }

    fn interface_at(&self, offset: u128) -> Option<Self> {
        if offset >= self.size() {
            return None;
        }
        let bits = u32::try_from(self.network_bits() + offset).ok()?;
        Ipv4Net::new(Ipv4Addr::from(bits), Ipv4Net::prefix_len(self)).ok()
    }

    fn halves(&self) -> Option<(Self, Self)> {
        let mut subnets = self.subnets(Ipv4Net::prefix_len(self) + 1).ok()?;
        Some((subnets.next()?, subnets.next()?))
    }

    fn covers(&self, other: &Self) -> bool {
        self.contains(other)
    }

    fn truncated(&self) -> Self {
        self.trunc()
    }

    fn into_ip_net(self) -> IpNet {
        IpNet::V4(self)
    }
}

impl Prefix for Ipv6Net {
    const FAMILY: AddressFamily = AddressFamily::Ipv6;
    const BITS: u8 = 128;

    fn prefix_len(&self) -> u8 {
        Ipv6Net::prefix_len(self)
    }

    fn network_bits(&self) -> u128 {
        u128::from(self.network())
    }

    fn addr_bits(&self) -> u128 {
        u128::from(self.addr())
    }

    fn interface_at(&self, offset: u128) -> Option<Self> {
        if offset >= self.size() {
            return None;
        }
        let bits = self.network_bits().checked_add(offset)?;
        Ipv6Net::new(Ipv6Addr::from(bits), Ipv6Net::prefix_len(self)).ok()
    }

    fn halves(&self) -> Option<(Self, Self)> {
        let mut subnets = self.subnets(Ipv6Net::prefix_len(self) + 1).ok()?;
        Some((subnets.next()?, subnets.next()?))
    }

    fn covers(&self, other: &Self) -> bool {
        self.contains(other)
    }

    fn truncated(&self) -> Self {
        self.trunc()
    }

    fn into_ip_net(self) -> IpNet {
        IpNet::V6(self)
    }
}

/// Smallest prefix length whose block holds `demand` addresses plus `reserved` ones.
///
/// Returns `None` when even the whole family space is too small.
pub fn required_prefix_len<P: Prefix>(demand: u128, reserved: u8) -> Option<u8> {
    let total = demand.checked_add(u128::from(reserved))?.max(1);
    let host_bits = 128 - (total - 1).leading_zeros();
    if host_bits > u32::from(P::BITS) {
        return None;
    }
    Some(P::BITS - host_bits as u8)
}

/// A pool of unallocated, non-overlapping supernets of one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace<P: Prefix> {
    blocks: Vec<P>,
}

impl<P: Prefix> AddressSpace<P> {
    /// Create a pool holding a single base prefix
    pub fn new(base: P) -> Self {
        Self {
            blocks: vec![base.truncated()],
        }
    }

    /// Create an empty pool, used when a family is disabled
    pub fn empty() -> Self {
        Self { blocks: Vec::new() }
    }

    /// The available blocks, smallest first, ties by lowest network address
    pub fn blocks(&self) -> &[P] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of addresses still available, saturating
    pub fn available(&self) -> u128 {
        self.blocks
            .iter()
            .fold(0u128, |acc, block| acc.saturating_add(block.size()))
    }

    fn sort(&mut self) {
        self.blocks.sort_by(|a, b| {
            b.prefix_len()
                .cmp(&a.prefix_len())
                .then_with(|| a.network_bits().cmp(&b.network_bits()))
        });
    }

    /// Carve a block of exactly `prefix_len` out of the smallest supernet able
    /// to hold it.
    ///
    /// The chosen supernet is halved repeatedly, keeping the lower half and
    /// returning every upper half to the pool, so later requests reuse these
    /// fragments before touching larger untouched blocks.
    pub fn carve(&mut self, prefix_len: u8) -> Option<P> {
        if prefix_len > P::BITS {
            return None;
        }
        self.sort();
        let index = self
            .blocks
            .iter()
            .position(|block| block.prefix_len() <= prefix_len)?;
        let mut block = self.blocks.remove(index);
        while block.prefix_len() < prefix_len {
            match block.halves() {
                Some((low, high)) => {
                    self.blocks.push(high);
                    block = low;
                }
                None => {
                    self.blocks.push(block);
                    self.sort();
                    return None;
                }
            }
        }
        self.sort();
        Some(block)
    }

    /// Take `net` out of the pool, splitting the supernet that contains it.
    ///
    /// Returns whether any part of the pool was removed.
    pub fn reserve(&mut self, net: P) -> bool {
        let net = net.truncated();
        let before = self.blocks.len();
        self.blocks.retain(|block| !net.covers(block));
        let mut removed = self.blocks.len() != before;

        if let Some(index) = self.blocks.iter().position(|block| block.covers(&net)) {
            let mut block = self.blocks.remove(index);
            while block.prefix_len() < net.prefix_len() {
                let Some((low, high)) = block.halves() else {
                    break;
                };
                if low.covers(&net) {
                    self.blocks.push(high);
                    block = low;
                } else {
                    self.blocks.push(low);
                    block = high;
                }
            }
            removed = true;
        }
        self.sort();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_required_prefix_len() {
        assert_eq!(required_prefix_len::<Ipv4Net>(2, 2), Some(30));
        assert_eq!(required_prefix_len::<Ipv4Net>(100, 2), Some(25));
        assert_eq!(required_prefix_len::<Ipv4Net>(10, 2), Some(28));
        assert_eq!(required_prefix_len::<Ipv4Net>(254, 2), Some(24));
        assert_eq!(required_prefix_len::<Ipv4Net>(255, 2), Some(23));
        assert_eq!(required_prefix_len::<Ipv6Net>(2, 1), Some(126));
        assert_eq!(required_prefix_len::<Ipv6Net>(1, 0), Some(128));
        assert_eq!(required_prefix_len::<Ipv4Net>(u128::from(u32::MAX), 2), None);
    }

    #[test]
    fn test_interface_at() {
        let net = v4("192.168.0.0/30");
        assert_eq!(net.interface_at(1), Some(v4("192.168.0.1/30")));
        assert_eq!(net.interface_at(3), Some(v4("192.168.0.3/30")));
        assert_eq!(net.interface_at(4), None);
    }

    #[test]
    fn test_carve_splits_smallest_sufficient_block() {
        let mut space = AddressSpace::new(v4("10.0.0.0/22"));
        assert_eq!(space.carve(25), Some(v4("10.0.0.0/25")));
        assert_eq!(
            space.blocks(),
            &[v4("10.0.0.128/25"), v4("10.0.1.0/24"), v4("10.0.2.0/23")]
        );
        // The /28 reuses the leftover /25 rather than the untouched /23
        assert_eq!(space.carve(28), Some(v4("10.0.0.128/28")));
        assert!(space.blocks().iter().all(|b| !b.covers(&v4("10.0.0.128/28"))));
    }

    #[test]
    fn test_carve_prefers_lowest_network_on_ties() {
        let mut space = AddressSpace::new(v4("10.0.0.0/23"));
        assert_eq!(space.carve(24), Some(v4("10.0.0.0/24")));
        assert_eq!(space.carve(24), Some(v4("10.0.1.0/24")));
        assert_eq!(space.carve(24), None);
        assert!(space.is_empty());
    }

    #[test]
    fn test_carve_too_large() {
        let mut space = AddressSpace::new(v4("192.168.0.0/24"));
        assert_eq!(space.carve(23), None);
        assert_eq!(space.blocks(), &[v4("192.168.0.0/24")]);
    }

    #[test]
    fn test_reserve_splits_around_block() {
        let mut space = AddressSpace::new(v4("192.168.0.0/22"));
        assert!(space.reserve(v4("192.168.1.7/24")));
        assert_eq!(space.available(), 768);
        assert_eq!(space.blocks().len(), 2);
        assert!(space.blocks().contains(&v4("192.168.0.0/24")));
        assert!(space.blocks().contains(&v4("192.168.2.0/23")));
        // Outside of the pool
        assert!(!space.reserve(v4("10.0.0.0/24")));
    }

    #[test]
    fn test_reserve_swallows_inner_blocks() {
        let mut space = AddressSpace::new(v4("192.168.0.0/24"));
        space.carve(26);
        assert!(space.reserve(v4("192.168.0.0/24")));
        assert!(space.is_empty());
    }
}
