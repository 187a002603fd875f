//! Distance-vector table merge (RIP-like). No split horizon, so count-to-infinity is possible.

use std::collections::BTreeSet;

use crate::error::RouteError;
use crate::protocol::{RouteEntry, RoutingTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DvOutcome {
    Changed(RoutingTable),
    Unchanged,
}

impl DvOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, DvOutcome::Changed(_))
    }
}

/// Merges `neighbor_table`, advertised by `neighbor`, into `local_table`.
///
/// `local_table` must already hold a route to `neighbor`: its cost is the
/// link cost added to every advertised metric.
pub fn update(
    local_table: &RoutingTable,
    local_address: &str,
    neighbor_table: &RoutingTable,
    neighbor: &str,
) -> Result<DvOutcome, RouteError> {
    let link_cost = local_table
        .get_route(neighbor)
        .map(|entry| entry.metric)
        .ok_or_else(|| RouteError::MissingNeighborCost {
            neighbor: neighbor.to_string(),
        })?;

    let destinations: BTreeSet<&String> = local_table
        .destinations()
        .chain(neighbor_table.destinations())
        .filter(|destination| destination.as_str() != local_address)
        .collect();

    let mut merged = RoutingTable::new();
    for destination in destinations {
        let existing = local_table.get_route(destination);
        let advertised = neighbor_table
            .get_route(destination)
            .map(|entry| RouteEntry::new(neighbor, entry.metric.saturating_add(link_cost)));

        let best = match (existing, advertised) {
            (Some(current), Some(candidate)) if candidate.metric < current.metric => candidate,
            (Some(current), _) => current.clone(),
            (None, Some(candidate)) => candidate,
            (None, None) => {
                return Err(RouteError::NoCandidate {
                    destination: destination.clone(),
                })
            }
        };
        merged.add_route(destination.clone(), best);
    }

    if merged == *local_table {
        Ok(DvOutcome::Unchanged)
    } else {
        Ok(DvOutcome::Changed(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::routing_table::table;

    #[test]
    fn test_learns_routes_through_neighbor() {
        let local = table([("h1", "h1", 1), ("h2", "h2", 1), ("r2", "r2", 1)]);
        let advertised = table([("h3", "h3", 1), ("r1", "r1", 1), ("h4", "h4", 1)]);

        let outcome = update(&local, "r1", &advertised, "r2").unwrap();

        let expected = table([
            ("h1", "h1", 1),
            ("h2", "h2", 1),
            ("h3", "r2", 2),
            ("h4", "r2", 2),
            ("r2", "r2", 1),
        ]);
        assert_eq!(outcome, DvOutcome::Changed(expected));
    }

    #[test]
    fn test_same_advertisement_twice_is_unchanged() {
        let local = table([("h1", "h1", 1), ("r2", "r2", 1)]);
        let advertised = table([("h3", "h3", 1), ("r1", "r1", 1)]);

        let DvOutcome::Changed(next) = update(&local, "r1", &advertised, "r2").unwrap() else {
            panic!("first merge should change the table");
        };
        assert_eq!(update(&next, "r1", &advertised, "r2").unwrap(), DvOutcome::Unchanged);
    }

    #[test]
    fn test_tie_keeps_existing_route() {
        let local = table([("h9", "r3", 2), ("r2", "r2", 1), ("r3", "r3", 1)]);
        let advertised = table([("h9", "h9", 1)]);

        assert_eq!(update(&local, "r1", &advertised, "r2").unwrap(), DvOutcome::Unchanged);
    }

    #[test]
    fn test_shorter_path_replaces_existing() {
        let local = table([("h9", "r3", 5), ("r2", "r2", 1), ("r3", "r3", 1)]);
        let advertised = table([("h9", "h9", 1)]);

        let DvOutcome::Changed(next) = update(&local, "r1", &advertised, "r2").unwrap() else {
            panic!("expected a better route");
        };
        assert_eq!(next.get_route("h9"), Some(&RouteEntry::new("r2", 2)));
    }

    #[test]
    fn test_never_routes_to_self() {
        let local = table([("r2", "r2", 1)]);
        let advertised = table([("r1", "r1", 1), ("h1", "r1", 2)]);

        let DvOutcome::Changed(next) = update(&local, "r1", &advertised, "r2").unwrap() else {
            panic!("expected h1 to be learned");
        };
        assert!(!next.contains("r1"));
        // No split horizon: a route pointing back through us is still taken.
        assert_eq!(next.get_route("h1"), Some(&RouteEntry::new("r2", 3)));
    }

    #[test]
    fn test_missing_neighbor_cost_is_rejected() {
        let local = table([("h1", "h1", 1)]);
        let advertised = table([("h3", "h3", 1)]);

        assert_eq!(
            update(&local, "r1", &advertised, "r2"),
            Err(RouteError::MissingNeighborCost { neighbor: "r2".to_string() })
        );
    }

    #[test]
    fn test_cost_saturates() {
        let local = table([("r2", "r2", 1)]);
        let advertised = table([("h1", "x", u32::MAX)]);

        let DvOutcome::Changed(next) = update(&local, "r1", &advertised, "r2").unwrap() else {
            panic!("expected h1 to be learned");
        };
        assert_eq!(next.get_route("h1").map(|e| e.metric), Some(u32::MAX));
    }
}
