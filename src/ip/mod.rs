//! IP address allocation and management module.
//!
//! This module carves the configured base prefixes into one subnet per
//! broadcast domain and hands out interface addresses from those subnets,
//! for IPv4 and IPv6 independently.

pub mod address_space;
pub mod allocator;
pub mod domain;
pub mod error;
pub mod registry;

// Re-export commonly used types
pub use address_space::{AddressFamily, AddressSpace, Prefix};
pub use allocator::{allocate_subnets, assign_addresses, FamilySettings};
pub use domain::{compute_domains, BroadcastDomain, DomainId, DomainSet, Family};
pub use error::{AllocationError, ExhaustionCause};
pub use registry::AddressRegistry;
