//! Errors raised while allocating subnets and issuing addresses.

use std::fmt;
use std::net::IpAddr;

use super::address_space::AddressFamily;
use super::domain::DomainId;

/// Why a broadcast domain could not get a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionCause {
    /// The block would be larger than the configured cap
    AboveCap { cap: u8 },
    /// No block left in the pool is large enough
    PoolDepleted,
}

impl fmt::Display for ExhaustionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AboveCap { cap } => write!(f, "the largest allowed block is /{}", cap),
            Self::PoolDepleted => write!(f, "the address pool has no block that large left"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error(
        "No {family} block can host broadcast domain {domain} [{members}]: \
         {required} addresses need a /{prefix_len} but {cause}"
    )]
    AddressExhaustion {
        family: AddressFamily,
        domain: DomainId,
        members: String,
        required: u128,
        prefix_len: u8,
        cause: ExhaustionCause,
    },

    #[error("No more available {family} address in {net} (broadcast domain {domain})")]
    AddressSpaceExhausted {
        family: AddressFamily,
        domain: DomainId,
        net: String,
    },

    #[error("No {family} subnet is associated with broadcast domain {domain}")]
    NoSubnetAssigned {
        family: AddressFamily,
        domain: DomainId,
    },

    #[error("Static subnet {net} of broadcast domain {domain} overlaps {other} of broadcast domain {other_domain}")]
    OverlappingSubnets {
        net: String,
        domain: DomainId,
        other: String,
        other_domain: DomainId,
    },

    #[error("Address {address} is assigned to both {first} and {second}")]
    DuplicateAddress {
        address: IpAddr,
        first: String,
        second: String,
    },
}
