use log::{debug, error, info, warn};
use std::collections::BTreeSet;

use crate::algorithms::distance_vector::{self, DvOutcome};
use crate::error::NodeError;
use crate::{Address, BROADCAST, is_broadcast};
use super::messages::*;
use super::routing_table::{RouteEntry, RoutingTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TtlExpired,
    NoRoute,
    /// Routers are not data sinks.
    AddressedToRouter,
}

/// What the router did with the message it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Forwarded { next_hop: Address },
    Flooded { copies: usize },
    Dropped(DropReason),
    /// Control-plane message consumed (monitor command or RIP update).
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub outbound: Vec<Outbound>,
    pub disposition: Disposition,
}

impl Handled {
    fn control(outbound: Vec<Outbound>) -> Self {
        Self {
            outbound,
            disposition: Disposition::Control,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    address: Address,
    routing_table: RoutingTable,
    neighbors: BTreeSet<Address>,
    rip_enabled: bool,
}

impl Router {
    pub fn new(address: impl Into<Address>, neighbors: impl IntoIterator<Item = Address>) -> Self {
        let address = address.into();
        let neighbors = neighbors.into_iter().filter(|n| *n != address).collect();
        Self {
            address,
            routing_table: RoutingTable::new(),
            neighbors,
            rip_enabled: false,
        }
    }

    pub fn with_rip(mut self, enabled: bool) -> Self {
        self.rip_enabled = enabled;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn neighbors(&self) -> &BTreeSet<Address> {
        &self.neighbors
    }

    pub fn rip_enabled(&self) -> bool {
        self.rip_enabled
    }

    /// Replaces the table wholesale. Any entry for our own address is dropped.
    pub fn set_routing_table(&mut self, table: RoutingTable) {
        self.routing_table = table.without_self(&self.address);
    }

    pub fn handle(&mut self, from: &str, message: ProtocolMessage) -> Result<Handled, NodeError> {
        match message {
            ProtocolMessage::MonitorRequest(command) => Ok(self.handle_command(from, command)),
            ProtocolMessage::RipUpdate(update) => self.handle_rip_update(update),
            ProtocolMessage::Data(packet) => Ok(self.handle_data(from, packet)),
            ProtocolMessage::MonitorResponse(_) => Err(NodeError::Unexpected {
                kind: "monitor-response",
                from: from.to_string(),
            }),
        }
    }

    fn handle_command(&mut self, from: &str, command: MonitorCommand) -> Handled {
        debug!("{}: monitor command {} from {}", self.address, command.name(), from);

        let outbound = match command {
            MonitorCommand::RipOn => {
                self.rip_enabled = true;
                info!("{}: RIP enabled", self.address);
                Vec::new()
            }
            MonitorCommand::RipOff => {
                self.rip_enabled = false;
                info!("{}: RIP disabled", self.address);
                Vec::new()
            }
            MonitorCommand::GetSnapshot { round } => {
                let snapshot = Snapshot {
                    table: self.routing_table.clone(),
                    round,
                };
                vec![Outbound::new(from, ProtocolMessage::MonitorResponse(snapshot))]
            }
            MonitorCommand::SetTable { table } => {
                self.set_routing_table(table);
                info!("{}: table replaced by monitor ({} routes)", self.address, self.routing_table.len());
                Vec::new()
            }
            MonitorCommand::BroadcastTtl0 => self
                .neighbors
                .iter()
                .map(|neighbor| {
                    let probe = DataPacket {
                        src: self.address.clone(),
                        dst: BROADCAST.to_string(),
                        ttl: 0,
                        payload: String::new(),
                    };
                    Outbound::new(neighbor.clone(), ProtocolMessage::Data(probe))
                })
                .collect(),
            MonitorCommand::ClearTable => {
                self.routing_table.clear();
                info!("{}: table cleared", self.address);
                Vec::new()
            }
            MonitorCommand::PrintTable => {
                info!("{}: routing table\n{}", self.address, self.routing_table);
                Vec::new()
            }
        };

        Handled::control(outbound)
    }

    fn handle_rip_update(&mut self, update: RipUpdate) -> Result<Handled, NodeError> {
        if update.dst != self.address {
            error!(
                "{}: CRITICAL RIP update from {} addressed to {}",
                self.address, update.src, update.dst
            );
        }

        match distance_vector::update(&self.routing_table, &self.address, &update.table, &update.src)? {
            DvOutcome::Changed(table) => {
                info!("{}: table changed by RIP update from {}", self.address, update.src);
                self.routing_table = table;
                Ok(Handled::control(self.rip_broadcast()))
            }
            DvOutcome::Unchanged => {
                debug!("{}: RIP update from {} changed nothing", self.address, update.src);
                Ok(Handled::control(Vec::new()))
            }
        }
    }

    fn handle_data(&mut self, from: &str, packet: DataPacket) -> Handled {
        let learned = self.learn_source(&packet.src, from);

        let (mut outbound, disposition) = self.forward(from, packet);

        if learned && self.rip_enabled {
            outbound.extend(self.rip_broadcast());
        }

        Handled { outbound, disposition }
    }

    /// Passive learning: an unknown source is reachable through the neighbor
    /// it arrived from. Returns whether the table changed.
    fn learn_source(&mut self, src: &str, from: &str) -> bool {
        if src == self.address {
            return false;
        }
        match self.routing_table.get_route(src) {
            None => {
                info!("{}: learned {} via {}", self.address, src, from);
                self.routing_table.add_route(src, RouteEntry::new(from, 1));
                true
            }
            Some(existing) if existing.next_hop != from => {
                warn!(
                    "{}: conflict for {}: known via {}, packet arrived via {}; keeping {}",
                    self.address, src, existing.next_hop, from, existing.next_hop
                );
                false
            }
            Some(_) => false,
        }
    }

    fn forward(&self, from: &str, packet: DataPacket) -> (Vec<Outbound>, Disposition) {
        if packet.ttl == 0 {
            info!("{}: dropped packet {} -> {}: ttl expired", self.address, packet.src, packet.dst);
            return (Vec::new(), Disposition::Dropped(DropReason::TtlExpired));
        }

        if packet.dst == self.address {
            error!(
                "{}: rejected data packet from {} addressed to this router",
                self.address, packet.src
            );
            return (Vec::new(), Disposition::Dropped(DropReason::AddressedToRouter));
        }

        let ttl = packet.ttl - 1;

        if is_broadcast(&packet.dst) {
            let outbound: Vec<Outbound> = self
                .neighbors
                .iter()
                .filter(|neighbor| neighbor.as_str() != from)
                .map(|neighbor| {
                    let copy = DataPacket { ttl, ..packet.clone() };
                    Outbound::new(neighbor.clone(), ProtocolMessage::Data(copy))
                })
                .collect();
            let copies = outbound.len();
            debug!("{}: flooded packet from {} to {} neighbors", self.address, packet.src, copies);
            return (outbound, Disposition::Flooded { copies });
        }

        match self.routing_table.get_route(&packet.dst) {
            Some(route) => {
                let next_hop = route.next_hop.clone();
                debug!("{}: forwarding {} -> {} via {}", self.address, packet.src, packet.dst, next_hop);
                let outbound = vec![Outbound::new(
                    next_hop.clone(),
                    ProtocolMessage::Data(DataPacket { ttl, ..packet }),
                )];
                (outbound, Disposition::Forwarded { next_hop })
            }
            None => {
                info!("{}: dropped packet {} -> {}: no route", self.address, packet.src, packet.dst);
                (Vec::new(), Disposition::Dropped(DropReason::NoRoute))
            }
        }
    }

    /// Triggered update: our full table, to every neighbor.
    fn rip_broadcast(&self) -> Vec<Outbound> {
        self.neighbors
            .iter()
            .map(|neighbor| {
                let update = RipUpdate {
                    src: self.address.clone(),
                    dst: neighbor.clone(),
                    table: self.routing_table.clone(),
                };
                Outbound::new(neighbor.clone(), ProtocolMessage::RipUpdate(update))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;
    use crate::protocol::routing_table::table;

    fn router(address: &str, neighbors: &[&str]) -> Router {
        Router::new(address, neighbors.iter().map(|n| n.to_string()))
    }

    fn data(src: &str, dst: &str, ttl: u32) -> ProtocolMessage {
        ProtocolMessage::Data(DataPacket {
            src: src.to_string(),
            dst: dst.to_string(),
            ttl,
            payload: String::new(),
        })
    }

    fn ttl_of(outbound: &Outbound) -> u32 {
        match &outbound.message {
            ProtocolMessage::Data(packet) => packet.ttl,
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[test]
    fn test_learns_source_from_arrival_neighbor() {
        let mut r1 = router("r1", &["h1", "r2"]);

        r1.handle("r2", data("h3", "h1", 0)).unwrap();

        assert_eq!(r1.routing_table().get_route("h3"), Some(&RouteEntry::new("r2", 1)));
    }

    #[test]
    fn test_conflicting_source_keeps_first_mapping() {
        let mut r1 = router("r1", &["h1", "r2", "r3"]);
        r1.handle("r2", data("h3", "*", 0)).unwrap();

        r1.handle("r3", data("h3", "*", 0)).unwrap();

        assert_eq!(r1.routing_table().get_route("h3"), Some(&RouteEntry::new("r2", 1)));
    }

    #[test]
    fn test_ttl_zero_is_never_forwarded() {
        let mut r1 = router("r1", &["h1", "r2"]);
        r1.set_routing_table(table([("h3", "r2", 2)]));

        let handled = r1.handle("h1", data("h1", "h3", 0)).unwrap();

        assert!(handled.outbound.is_empty());
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::TtlExpired));
    }

    #[test]
    fn test_unicast_decrements_ttl() {
        let mut r1 = router("r1", &["h1", "r2"]);
        r1.set_routing_table(table([("h1", "h1", 1), ("h3", "r2", 2)]));

        let handled = r1.handle("h1", data("h1", "h3", 4)).unwrap();

        assert_eq!(handled.disposition, Disposition::Forwarded { next_hop: "r2".to_string() });
        assert_eq!(handled.outbound.len(), 1);
        assert_eq!(handled.outbound[0].to, "r2");
        assert_eq!(ttl_of(&handled.outbound[0]), 3);
    }

    #[test]
    fn test_flood_skips_arrival_neighbor() {
        let mut r1 = router("r1", &["h1", "h2", "r2"]);

        let handled = r1.handle("r2", data("h3", BROADCAST, 2)).unwrap();

        let targets: Vec<&str> = handled.outbound.iter().map(|o| o.to.as_str()).collect();
        assert_eq!(targets, vec!["h1", "h2"]);
        assert!(handled.outbound.iter().all(|o| ttl_of(o) == 1));
        assert_eq!(handled.disposition, Disposition::Flooded { copies: 2 });
    }

    #[test]
    fn test_unknown_destination_is_dropped() {
        let mut r1 = router("r1", &["h1"]);

        let handled = r1.handle("h1", data("h1", "h9", 5)).unwrap();

        assert!(handled.outbound.is_empty());
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::NoRoute));
    }

    #[test]
    fn test_data_addressed_to_router_is_rejected() {
        let mut r1 = router("r1", &["h1"]);

        let handled = r1.handle("h1", data("h1", "r1", 5)).unwrap();

        assert!(handled.outbound.is_empty());
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::AddressedToRouter));
        // The source is still learned.
        assert!(r1.routing_table().contains("h1"));
    }

    #[test]
    fn test_learning_triggers_rip_broadcast_when_enabled() {
        let mut r1 = router("r1", &["h1", "r2"]).with_rip(true);

        let handled = r1.handle("h1", data("h1", BROADCAST, 0)).unwrap();

        let updates: Vec<&Outbound> = handled
            .outbound
            .iter()
            .filter(|o| matches!(o.message, ProtocolMessage::RipUpdate(_)))
            .collect();
        assert_eq!(updates.len(), 2);

        // Already known: no new update.
        let handled = r1.handle("h1", data("h1", BROADCAST, 0)).unwrap();
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_own_broadcast_is_not_learned() {
        let mut r1 = router("r1", &["r2"]).with_rip(true);

        let handled = r1.handle("r2", data("r1", BROADCAST, 0)).unwrap();

        assert!(r1.routing_table().is_empty());
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_rip_update_propagates_change() {
        let mut r1 = router("r1", &["h1", "r2"]);
        r1.set_routing_table(table([("h1", "h1", 1), ("r2", "r2", 1)]));
        let update = ProtocolMessage::RipUpdate(RipUpdate {
            src: "r2".to_string(),
            dst: "r1".to_string(),
            table: table([("h3", "h3", 1), ("r1", "r1", 1)]),
        });

        let handled = r1.handle("r2", update.clone()).unwrap();

        assert_eq!(r1.routing_table().get_route("h3"), Some(&RouteEntry::new("r2", 2)));
        assert_eq!(handled.outbound.len(), 2);
        for outbound in &handled.outbound {
            let ProtocolMessage::RipUpdate(sent) = &outbound.message else {
                panic!("expected a RIP update");
            };
            assert_eq!(sent.dst, outbound.to);
            assert_eq!(&sent.table, r1.routing_table());
        }

        // Converged: the same update again is silent.
        let handled = r1.handle("r2", update).unwrap();
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_misaddressed_rip_update_is_still_applied() {
        let mut r1 = router("r1", &["r2"]);
        r1.set_routing_table(table([("r2", "r2", 1)]));
        let update = ProtocolMessage::RipUpdate(RipUpdate {
            src: "r2".to_string(),
            dst: "r7".to_string(),
            table: table([("h3", "h3", 1)]),
        });

        r1.handle("r2", update).unwrap();

        assert!(r1.routing_table().contains("h3"));
    }

    #[test]
    fn test_rip_update_from_unknown_neighbor_is_rejected() {
        let mut r1 = router("r1", &["r2"]);
        let before = r1.routing_table().clone();
        let update = ProtocolMessage::RipUpdate(RipUpdate {
            src: "r2".to_string(),
            dst: "r1".to_string(),
            table: table([("h3", "h3", 1)]),
        });

        let err = r1.handle("r2", update).unwrap_err();

        assert_eq!(
            err,
            NodeError::Route(RouteError::MissingNeighborCost { neighbor: "r2".to_string() })
        );
        assert_eq!(r1.routing_table(), &before);
    }

    #[test]
    fn test_monitor_commands() {
        let mut r1 = router("r1", &["h1", "r2"]);
        let command = |c| ProtocolMessage::MonitorRequest(c);

        r1.handle("m", command(MonitorCommand::RipOn)).unwrap();
        assert!(r1.rip_enabled());
        r1.handle("m", command(MonitorCommand::RipOff)).unwrap();
        assert!(!r1.rip_enabled());

        let new_table = table([("h1", "h1", 1), ("r1", "r1", 1)]);
        r1.handle("m", command(MonitorCommand::SetTable { table: new_table })).unwrap();
        assert_eq!(r1.routing_table(), &table([("h1", "h1", 1)]));

        let handled = r1.handle("m", command(MonitorCommand::get_snapshot())).unwrap();
        assert_eq!(
            handled.outbound,
            vec![Outbound::new(
                "m",
                ProtocolMessage::MonitorResponse(Snapshot { table: table([("h1", "h1", 1)]), round: None })
            )]
        );

        let handled = r1.handle("m", command(MonitorCommand::BroadcastTtl0)).unwrap();
        assert_eq!(handled.outbound.len(), 2);
        assert!(handled.outbound.iter().all(|o| ttl_of(o) == 0));

        r1.handle("m", command(MonitorCommand::ClearTable)).unwrap();
        assert!(r1.routing_table().is_empty());

        let handled = r1.handle("m", command(MonitorCommand::PrintTable)).unwrap();
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_monitor_response_is_unexpected() {
        let mut r1 = router("r1", &["r2"]);
        let response = ProtocolMessage::MonitorResponse(Snapshot { table: RoutingTable::new(), round: None });

        assert!(matches!(r1.handle("r2", response), Err(NodeError::Unexpected { .. })));
    }
}
