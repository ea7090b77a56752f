//! Router identification and peering.
//!
//! This module picks router-ids, resolves the addresses routers use to
//! reach each other and builds BGP neighbor lists.

pub mod bgp;
pub mod daemon;
pub mod peer;
pub mod router_id;

pub use bgp::{bgp_neighbors, rr_clients, BgpNeighbor};
pub use daemon::Daemon;
pub use peer::{find_peer_address, PeerAddress};
pub use router_id::{IdAllocator, RouterIdError, ROUTER_ID_SEED};
