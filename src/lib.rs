//! # IPNetLab - Address planning for emulated IP networks
//!
//! This library turns a topology of routers, hosts and switches into a
//! complete addressing plan: one subnet per broadcast domain, addresses for
//! every interface, router-ids and BGP neighbor lists.
//!
//! ## Overview
//!
//! Emulated networks need addresses that are unique, sized to their links
//! and stable from one run to the next. IPNetLab computes them from a small
//! YAML description, so experiments can be rebuilt identically.
//!
//! ## Key Features
//!
//! - **Broadcast Domains**: Interfaces joined by links and switches share a subnet
//! - **Tight Subnets**: Blocks are sized to the number of interfaces, largest first
//! - **Dual Stack**: IPv4 and IPv6 allocated independently from their own pools
//! - **Static Addresses**: User-set addresses pin the subnet of their domain
//! - **Router-ids**: Explicit, address-derived or counter-based, unique among neighbors
//! - **BGP Peering**: Peer addresses resolved along the cheapest IGP path
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and topology construction
//! - `topology`: Node/interface/link graph and overlays
//! - `ip`: Address pools, broadcast domains, allocation and the address registry
//! - `router`: Daemons, router-ids, peer resolution and BGP neighbors
//! - `network`: High-level orchestration of the allocation phases
//! - `plan`: Serialisable allocation plan
//! - `utils`: Address classification helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ipnetlab::config::NetworkSettings;
//! use ipnetlab::network::Network;
//! use ipnetlab::topology::{LinkParams, Topology};
//!
//! let mut topo = Topology::new();
//! let r1 = topo.add_router("r1")?;
//! let r2 = topo.add_router("r2")?;
//! topo.add_link(r1, r2, LinkParams::new());
//!
//! let mut network = Network::new(topo, NetworkSettings::default());
//! network.build()?;
//! println!("r1 uses router-id {}", network.router_id("r1")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! network:
//!   ip_base: 10.0.0.0/16
//!   max_v4_prefixlen: 24
//!   ip6_base: fd00::/48
//!   v6_block_prefixlen: 64
//!
//! nodes:
//!   - name: r1
//!     kind: router
//!     daemons:
//!       ospf: {}
//!       bgp: {}
//!   - name: r2
//!     kind: router
//!   - name: h1
//!     kind: host
//!
//! links:
//!   - nodes: [r1, r2]
//!     igp_metric: 5
//!   - nodes: [h1, r1]
//!
//! overlays:
//!   - type: ebgp_session
//!     a: r1
//!     b: r2
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed errors built with `thiserror`, gathered
//! in [`error::NetworkError`]. File loading and the command line tool use
//! `color_eyre` for error reporting with context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod ip;
pub mod network;
pub mod plan;
pub mod router;
pub mod topology;
pub mod utils;

pub use error::NetworkError;
pub use network::Network;
