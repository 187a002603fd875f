//! In-process network simulation over a seeded, optionally lossy queue.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};

use crate::Address;
use crate::protocol::{
    CompletedRound, DataPacket, Disposition, Host, Monitor, MonitorCommand, Outbound, ProtocolMessage, Router,
};
use super::topology::Topology;

pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// Impairments applied to every message in flight.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConditions {
    /// Probability in [0.0, 1.0] that a message is lost.
    pub loss_rate: f64,
    /// Deliver a random queued message instead of the oldest one.
    pub reorder: bool,
    pub seed: u64,
}

impl NetworkConditions {
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            reorder: false,
            seed: 0,
        }
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::perfect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    /// Messages addressed to a node that does not exist.
    pub undeliverable: u64,
    /// Messages a node refused with an error.
    pub rejected: u64,
    pub forwarded: u64,
    pub flooded: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub steps: usize,
    /// False when the step limit stopped the run with messages still queued.
    pub quiescent: bool,
}

#[derive(Debug)]
pub enum SimNode {
    Router(Router),
    Host(Host),
    Monitor(Monitor),
}

#[derive(Debug, Clone)]
struct InFlight {
    from: Address,
    to: Address,
    message: ProtocolMessage,
}

pub struct Simulation {
    nodes: BTreeMap<Address, SimNode>,
    queue: VecDeque<InFlight>,
    conditions: NetworkConditions,
    rng: StdRng,
    step_limit: usize,
    stats: SimStats,
    deliveries: Vec<(Address, DataPacket)>,
    rounds: Vec<CompletedRound>,
}

impl Simulation {
    pub fn new(conditions: NetworkConditions) -> Self {
        Self {
            nodes: BTreeMap::new(),
            queue: VecDeque::new(),
            rng: StdRng::seed_from_u64(conditions.seed),
            conditions,
            step_limit: DEFAULT_STEP_LIMIT,
            stats: SimStats::default(),
            deliveries: Vec::new(),
            rounds: Vec::new(),
        }
    }

    /// Builds one router per topology router and one host per topology host,
    /// each knowing its linked neighbors, plus a monitor that knows every router.
    pub fn from_topology(topology: &Topology, monitor: &str, conditions: NetworkConditions) -> Self {
        let mut sim = Self::new(conditions);
        for router in &topology.routers {
            sim.add_node(SimNode::Router(Router::new(router.clone(), topology.neighbors_of(router))));
        }
        for host in &topology.hosts {
            sim.add_node(SimNode::Host(Host::new(host.clone(), topology.neighbors_of(host))));
        }
        sim.add_node(SimNode::Monitor(Monitor::new(monitor, topology.routers.iter().cloned())));
        sim
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn set_conditions(&mut self, conditions: NetworkConditions) {
        self.rng = StdRng::seed_from_u64(conditions.seed);
        self.conditions = conditions;
    }

    pub fn add_node(&mut self, node: SimNode) {
        let address = match &node {
            SimNode::Router(router) => router.address().to_string(),
            SimNode::Host(host) => host.address().to_string(),
            SimNode::Monitor(monitor) => monitor.address().to_string(),
        };
        self.nodes.insert(address, node);
    }

    pub fn router(&self, address: &str) -> Option<&Router> {
        match self.nodes.get(address) {
            Some(SimNode::Router(router)) => Some(router),
            _ => None,
        }
    }

    pub fn router_mut(&mut self, address: &str) -> Option<&mut Router> {
        match self.nodes.get_mut(address) {
            Some(SimNode::Router(router)) => Some(router),
            _ => None,
        }
    }

    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.nodes.values().filter_map(|node| match node {
            SimNode::Router(router) => Some(router),
            _ => None,
        })
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Data packets accepted by hosts, in delivery order.
    pub fn deliveries(&self) -> &[(Address, DataPacket)] {
        &self.deliveries
    }

    pub fn completed_rounds(&self) -> &[CompletedRound] {
        &self.rounds
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn inject(&mut self, from: &str, outbound: Vec<Outbound>) {
        for Outbound { to, message } in outbound {
            self.stats.sent += 1;
            self.queue.push_back(InFlight {
                from: from.to_string(),
                to,
                message,
            });
        }
    }

    pub fn host_send(&mut self, host: &str, dst: &str, payload: &str) {
        let outbound = match self.nodes.get(host) {
            Some(SimNode::Host(h)) => h.send(dst, payload),
            _ => {
                warn!("no host {} in simulation", host);
                return;
            }
        };
        self.inject(host, outbound);
    }

    /// Every host sends a zero-TTL broadcast so its routers learn it.
    pub fn announce_hosts(&mut self) {
        let announcements: Vec<(Address, Vec<Outbound>)> = self
            .nodes
            .iter()
            .filter_map(|(address, node)| match node {
                SimNode::Host(host) => Some((address.clone(), host.announce())),
                _ => None,
            })
            .collect();
        for (address, outbound) in announcements {
            self.inject(&address, outbound);
        }
    }

    fn monitor_address(&self) -> Option<Address> {
        self.nodes.iter().find_map(|(address, node)| match node {
            SimNode::Monitor(_) => Some(address.clone()),
            _ => None,
        })
    }

    fn with_monitor<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Monitor) -> Vec<Outbound>,
    {
        let Some(address) = self.monitor_address() else {
            warn!("no monitor in simulation");
            return;
        };
        let outbound = match self.nodes.get_mut(&address) {
            Some(SimNode::Monitor(monitor)) => f(monitor),
            _ => return,
        };
        self.inject(&address, outbound);
    }

    pub fn command_all(&mut self, command: MonitorCommand) {
        self.with_monitor(|monitor| monitor.command_all(command));
    }

    pub fn command_one(&mut self, router: &str, command: MonitorCommand) {
        self.with_monitor(|monitor| monitor.command_one(router, command));
    }

    pub fn start_round(&mut self) {
        self.with_monitor(|monitor| monitor.start_round());
    }

    pub fn run(&mut self) -> RunOutcome {
        let mut steps = 0;
        while steps < self.step_limit {
            let Some(in_flight) = self.next_in_flight() else {
                return RunOutcome { steps, quiescent: true };
            };
            steps += 1;

            if self.conditions.loss_rate > 0.0 && self.rng.gen_bool(self.conditions.loss_rate.min(1.0)) {
                self.stats.lost += 1;
                continue;
            }
            self.deliver(in_flight);
        }

        warn!("simulation stopped after {} steps with {} messages queued", steps, self.queue.len());
        RunOutcome {
            steps,
            quiescent: self.queue.is_empty(),
        }
    }

    fn next_in_flight(&mut self) -> Option<InFlight> {
        if self.conditions.reorder && self.queue.len() > 1 {
            let index = self.rng.gen_range(0..self.queue.len());
            self.queue.remove(index)
        } else {
            self.queue.pop_front()
        }
    }

    fn deliver(&mut self, in_flight: InFlight) {
        let InFlight { from, to, message } = in_flight;
        let Some(node) = self.nodes.get_mut(&to) else {
            debug!("no node {} for {} message from {}", to, message.kind(), from);
            self.stats.undeliverable += 1;
            return;
        };
        self.stats.delivered += 1;

        let outbound = match node {
            SimNode::Router(router) => match router.handle(&from, message) {
                Ok(handled) => {
                    match handled.disposition {
                        Disposition::Forwarded { .. } => self.stats.forwarded += 1,
                        Disposition::Flooded { .. } => self.stats.flooded += 1,
                        Disposition::Dropped(_) => self.stats.dropped += 1,
                        Disposition::Control => {}
                    }
                    handled.outbound
                }
                Err(e) => {
                    warn!("{} rejected message from {}: {}", to, from, e);
                    self.stats.rejected += 1;
                    Vec::new()
                }
            },
            SimNode::Host(host) => {
                if let Some(packet) = host.receive(&from, message) {
                    self.deliveries.push((to.clone(), packet));
                }
                Vec::new()
            }
            SimNode::Monitor(monitor) => match monitor.handle(&from, message) {
                Ok(Some(completed)) => {
                    let commands = completed.commands();
                    self.rounds.push(completed);
                    commands
                }
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!("{} rejected message from {}: {}", to, from, e);
                    self.stats.rejected += 1;
                    Vec::new()
                }
            },
        };

        self.inject(&to, outbound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Topology {
        let mut topo = Topology::new();
        topo.add_router("r1").add_router("r2").add_host("h1").add_host("h2");
        topo.add_link("h1", "r1").add_link("r1", "r2").add_link("r2", "h2");
        topo
    }

    #[test]
    fn test_announce_teaches_attached_router() {
        let mut sim = Simulation::from_topology(&line(), "m", NetworkConditions::perfect());

        sim.announce_hosts();
        let outcome = sim.run();

        assert!(outcome.quiescent);
        assert!(sim.router("r1").unwrap().routing_table().contains("h1"));
        assert!(!sim.router("r1").unwrap().routing_table().contains("h2"));
        // Zero-TTL probes are dropped at the first router.
        assert_eq!(sim.stats().dropped, 2);
    }

    #[test]
    fn test_unknown_destination_is_undeliverable() {
        let mut sim = Simulation::new(NetworkConditions::perfect());
        sim.inject("x", vec![Outbound::new("nowhere", ProtocolMessage::MonitorRequest(MonitorCommand::RipOn))]);

        sim.run();

        assert_eq!(sim.stats().undeliverable, 1);
    }

    #[test]
    fn test_total_loss_delivers_nothing() {
        let conditions = NetworkConditions { loss_rate: 1.0, reorder: true, seed: 7 };
        let mut sim = Simulation::from_topology(&line(), "m", conditions);

        sim.announce_hosts();
        sim.run();

        assert_eq!(sim.stats().lost, 2);
        assert_eq!(sim.stats().delivered, 0);
        assert!(sim.router("r1").unwrap().routing_table().is_empty());
    }

    #[test]
    fn test_step_limit_stops_run() {
        let mut sim = Simulation::from_topology(&line(), "m", NetworkConditions::perfect()).with_step_limit(1);

        sim.announce_hosts();
        let outcome = sim.run();

        assert_eq!(outcome, RunOutcome { steps: 1, quiescent: false });
    }
}
