//! Coordinator of the link-state rounds.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::algorithms::link_state;
use crate::error::NodeError;
use crate::Address;
use super::messages::*;
use super::routing_table::{AdjacencySnapshot, RoutingTable};

#[derive(Debug, Clone)]
pub struct CompletedRound {
    pub round: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub tables: BTreeMap<Address, RoutingTable>,
}

impl CompletedRound {
    /// One `set-table` per router, carrying that router's computed table.
    pub fn commands(&self) -> Vec<Outbound> {
        self.tables
            .iter()
            .map(|(router, table)| {
                let command = MonitorCommand::SetTable { table: table.clone() };
                Outbound::new(router.clone(), ProtocolMessage::MonitorRequest(command))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Monitor {
    address: Address,
    routers: BTreeSet<Address>,
    collection: BTreeMap<Address, AdjacencySnapshot>,
    round: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(address: impl Into<Address>, routers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            address: address.into(),
            routers: routers.into_iter().collect(),
            collection: BTreeMap::new(),
            round: None,
            started_at: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn routers(&self) -> &BTreeSet<Address> {
        &self.routers
    }

    pub fn current_round(&self) -> Option<Uuid> {
        self.round
    }

    /// Routers that have not answered the current round yet.
    pub fn missing(&self) -> Vec<Address> {
        self.routers
            .iter()
            .filter(|router| !self.collection.contains_key(*router))
            .cloned()
            .collect()
    }

    /// Resets the collection and asks every router for its table.
    pub fn start_round(&mut self) -> Vec<Outbound> {
        let round = Uuid::new_v4();
        self.collection.clear();
        self.round = Some(round);
        self.started_at = Some(Utc::now());
        info!("{}: starting collection round {} over {} routers", self.address, round, self.routers.len());

        self.command_all(MonitorCommand::GetSnapshot { round: Some(round) })
    }

    /// Records one router's table. Completes the round once every known
    /// router has answered.
    pub fn record_snapshot(&mut self, from: &str, snapshot: Snapshot) -> Option<CompletedRound> {
        if !self.routers.contains(from) {
            warn!("{}: snapshot from unknown router {}, ignoring", self.address, from);
            return None;
        }
        match (self.round, snapshot.round) {
            (_, None) => {}
            (Some(current), Some(answered)) if current == answered => {}
            (_, Some(answered)) => {
                debug!("{}: stale snapshot from {} (round {}), ignoring", self.address, from, answered);
                return None;
            }
        }

        self.collection.insert(from.to_string(), snapshot.table);
        debug!(
            "{}: snapshot from {} ({}/{})",
            self.address,
            from,
            self.collection.len(),
            self.routers.len()
        );

        if !self.is_complete() {
            return None;
        }

        let tables = link_state::compute(&self.collection);
        let completed = CompletedRound {
            round: self.round.take(),
            started_at: self.started_at.take(),
            completed_at: Utc::now(),
            tables,
        };
        self.collection.clear();
        info!("{}: collection complete, computed {} tables", self.address, completed.tables.len());

        Some(completed)
    }

    fn is_complete(&self) -> bool {
        !self.routers.is_empty() && self.collection.keys().eq(self.routers.iter())
    }

    /// Inbound dispatch: only snapshots are meaningful to the monitor.
    pub fn handle(&mut self, from: &str, message: ProtocolMessage) -> Result<Option<CompletedRound>, NodeError> {
        match message {
            ProtocolMessage::MonitorResponse(snapshot) => Ok(self.record_snapshot(from, snapshot)),
            other => Err(NodeError::Unexpected {
                kind: other.kind(),
                from: from.to_string(),
            }),
        }
    }

    pub fn command_all(&self, command: MonitorCommand) -> Vec<Outbound> {
        self.routers
            .iter()
            .map(|router| Outbound::new(router.clone(), ProtocolMessage::MonitorRequest(command.clone())))
            .collect()
    }

    pub fn command_one(&self, router: &str, command: MonitorCommand) -> Vec<Outbound> {
        if !self.routers.contains(router) {
            warn!("{}: {} is not a known router", self.address, router);
        }
        vec![Outbound::new(router, ProtocolMessage::MonitorRequest(command))]
    }
}
