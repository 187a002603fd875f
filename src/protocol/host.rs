use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::{Address, BROADCAST, is_broadcast};
use super::messages::*;

/// Default TTL given to packets a host originates.
pub const DEFAULT_BROADCAST_RADIUS: u32 = 8;

/// A data source and sink. Hosts keep no routing state: unicast goes to the
/// gateway (the first neighbor), broadcasts go to every neighbor.
#[derive(Debug, Clone)]
pub struct Host {
    address: Address,
    neighbors: BTreeSet<Address>,
    broadcast_radius: u32,
}

impl Host {
    pub fn new(address: impl Into<Address>, neighbors: impl IntoIterator<Item = Address>) -> Self {
        Self {
            address: address.into(),
            neighbors: neighbors.into_iter().collect(),
            broadcast_radius: DEFAULT_BROADCAST_RADIUS,
        }
    }

    pub fn with_broadcast_radius(mut self, radius: u32) -> Self {
        self.broadcast_radius = radius;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn neighbors(&self) -> &BTreeSet<Address> {
        &self.neighbors
    }

    pub fn gateway(&self) -> Option<&Address> {
        self.neighbors.iter().next()
    }

    pub fn send(&self, dst: &str, payload: impl Into<String>) -> Vec<Outbound> {
        self.send_with_ttl(dst, payload, self.broadcast_radius)
    }

    pub fn broadcast(&self, payload: impl Into<String>) -> Vec<Outbound> {
        self.send(BROADCAST, payload)
    }

    /// Zero-TTL broadcast: reaches direct neighbors only, which learn our
    /// address from it and go no further.
    pub fn announce(&self) -> Vec<Outbound> {
        self.send_with_ttl(BROADCAST, "", 0)
    }

    fn send_with_ttl(&self, dst: &str, payload: impl Into<String>, ttl: u32) -> Vec<Outbound> {
        let packet = DataPacket {
            src: self.address.clone(),
            dst: dst.to_string(),
            ttl,
            payload: payload.into(),
        };

        let targets: Vec<&Address> = if is_broadcast(dst) {
            self.neighbors.iter().collect()
        } else {
            self.gateway().into_iter().collect()
        };

        if targets.is_empty() {
            warn!("{}: no neighbor to send to {}", self.address, dst);
        }

        targets
            .into_iter()
            .map(|to| Outbound::new(to.clone(), ProtocolMessage::Data(packet.clone())))
            .collect()
    }

    /// Returns the packet when it is for us, `None` otherwise.
    pub fn receive(&self, from: &str, message: ProtocolMessage) -> Option<DataPacket> {
        match message {
            ProtocolMessage::Data(packet) if packet.dst == self.address || is_broadcast(&packet.dst) => {
                info!("{}: {} wrote: {:?}", self.address, packet.src, packet.payload);
                Some(packet)
            }
            ProtocolMessage::Data(packet) => {
                warn!(
                    "{}: unexpected packet {} -> {} from {}",
                    self.address, packet.src, packet.dst, from
                );
                None
            }
            other => {
                debug!("{}: ignoring {} message from {}", self.address, other.kind(), from);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::new("h1", ["r1".to_string(), "r9".to_string()]).with_broadcast_radius(3)
    }

    #[test]
    fn test_unicast_goes_to_gateway() {
        let out = host().send("h4", "ping");

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, "r1");
        let ProtocolMessage::Data(packet) = &out[0].message else {
            panic!("expected data");
        };
        assert_eq!(packet.ttl, 3);
        assert_eq!(packet.payload, "ping");
    }

    #[test]
    fn test_broadcast_goes_to_all_neighbors() {
        let out = host().broadcast("hello");
        let targets: Vec<&str> = out.iter().map(|o| o.to.as_str()).collect();
        assert_eq!(targets, vec!["r1", "r9"]);
    }

    #[test]
    fn test_announce_has_zero_ttl() {
        let out = host().announce();
        assert!(out.iter().all(|o| matches!(&o.message, ProtocolMessage::Data(p) if p.ttl == 0)));
    }

    #[test]
    fn test_accepts_only_own_or_broadcast() {
        let h = host();
        let packet = |dst: &str| {
            ProtocolMessage::Data(DataPacket {
                src: "h2".to_string(),
                dst: dst.to_string(),
                ttl: 1,
                payload: "x".to_string(),
            })
        };

        assert!(h.receive("r1", packet("h1")).is_some());
        assert!(h.receive("r1", packet(BROADCAST)).is_some());
        assert!(h.receive("r1", packet("h7")).is_none());
        assert!(h.receive("r1", ProtocolMessage::MonitorRequest(MonitorCommand::RipOn)).is_none());
    }

    #[test]
    fn test_isolated_host_sends_nothing() {
        let h = Host::new("h1", Vec::new());
        assert!(h.send("h2", "x").is_empty());
    }
}
