use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub next_hop: Address,
    pub metric: u32, // hop count
}

impl RouteEntry {
    pub fn new(next_hop: impl Into<Address>, metric: u32) -> Self {
        Self {
            next_hop: next_hop.into(),
            metric,
        }
    }

    /// A cost-1 entry is a direct physical adjacency.
    pub fn is_direct(&self) -> bool {
        self.metric == 1
    }
}

/// Destination -> (next hop, cost). Ordered so that iteration, snapshots and
/// computed results are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    entries: BTreeMap<Address, RouteEntry>,
}

/// A router's table as read by the link-state computation.
pub type AdjacencySnapshot = RoutingTable;

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn add_route(&mut self, destination: impl Into<Address>, entry: RouteEntry) {
        self.entries.insert(destination.into(), entry);
    }

    pub fn remove_route(&mut self, destination: &str) -> Option<RouteEntry> {
        self.entries.remove(destination)
    }

    pub fn get_route(&self, destination: &str) -> Option<&RouteEntry> {
        self.entries.get(destination)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.entries.contains_key(destination)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &RouteEntry)> {
        self.entries.iter()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &Address> {
        self.entries.keys()
    }

    /// Destinations reachable over a single link.
    pub fn direct_neighbors(&self) -> impl Iterator<Item = &Address> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_direct())
            .map(|(destination, _)| destination)
    }

    /// Drops any entry keyed by `owner`; a table never routes to itself.
    pub fn without_self(mut self, owner: &str) -> Self {
        self.entries.remove(owner);
        self
    }
}

impl FromIterator<(Address, RouteEntry)> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = (Address, RouteEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RoutingTable {
    type Item = (&'a Address, &'a RouteEntry);
    type IntoIter = std::collections::btree_map::Iter<'a, Address, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18} {:<18} {:<8}", "Destination", "Next Hop", "Metric")?;
        writeln!(f, "{}", "-".repeat(46))?;
        if self.entries.is_empty() {
            writeln!(f, "No routes found")?;
        }
        for (destination, entry) in &self.entries {
            writeln!(f, "{:<18} {:<18} {:<8}", destination, entry.next_hop, entry.metric)?;
        }
        Ok(())
    }
}

/// Builds a table from `(destination, next_hop, cost)` triples.
pub fn table<'a>(routes: impl IntoIterator<Item = (&'a str, &'a str, u32)>) -> RoutingTable {
    routes
        .into_iter()
        .map(|(destination, next_hop, metric)| (destination.to_string(), RouteEntry::new(next_hop, metric)))
        .collect()
}
