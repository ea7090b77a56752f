//! Crate-level error type.

use crate::config::ValidationError;
use crate::ip::AllocationError;
use crate::router::RouterIdError;
use crate::topology::TopologyError;

/// Any failure while building or querying a [`Network`](crate::network::Network)
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    RouterId(#[from] RouterIdError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The network has not been built yet")]
    NotBuilt,
}
