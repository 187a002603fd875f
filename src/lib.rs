pub mod algorithms;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod runtime;

pub use error::{Error, NodeError, Result, RouteError};

/// Opaque identifier of a host, router or monitor.
pub type Address = String;

/// Destination marker for packets flooded to every neighbor.
pub const BROADCAST: &str = "*";

pub fn is_broadcast(address: &str) -> bool {
    address == BROADCAST
}
