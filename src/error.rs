//! Error types for the routing core and its transports.

use thiserror::Error;

use crate::Address;

/// Failures of the route-computation engines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The local table has no direct cost for the advertising neighbor.
    #[error("no route to advertising neighbor {neighbor} in local table")]
    MissingNeighborCost { neighbor: Address },

    /// A destination appeared in a table but neither side offers a path.
    #[error("no candidate route for destination {destination}")]
    NoCandidate { destination: Address },
}

/// Rejection of one inbound message by a node. The node loop keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Route(#[from] RouteError),

    /// A message kind this node type has no handler for.
    #[error("unexpected {kind} message from {from}")]
    Unexpected { kind: &'static str, from: Address },
}

/// Top-level error type for the transports, configuration and services.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Datagram could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No socket address is known for this node address.
    #[error("unknown peer {0}")]
    UnknownPeer(Address),

    /// The in-memory channel backing a transport was closed.
    #[error("channel closed")]
    ChannelClosed,

    #[error("configuration error: {0}")]
    Config(String),

    /// The monitor gave up waiting for a complete snapshot set.
    #[error("collection round timed out after {secs}s, missing {missing:?}")]
    CollectTimeout { secs: u64, missing: Vec<Address> },
}

pub type Result<T> = std::result::Result<T, Error>;
