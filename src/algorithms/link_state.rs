use std::collections::{BTreeMap, BTreeSet, VecDeque};
use crate::Address;
use crate::protocol::{AdjacencySnapshot, RouteEntry, RoutingTable};

/// Reverse adjacency: destination -> routers that list it at cost 1.
type Adjacency<'a> = BTreeMap<&'a str, BTreeSet<&'a str>>;

#[derive(Debug)]
struct Visit<'a> {
    router: &'a str,
    hops: u32,
}

/// Computes, for every router in `snapshots`, a route to every host it can
/// reach. Routers are the snapshot keys; hosts are every other destination
/// that appears inside a snapshot. Only cost-1 entries count as links.
///
/// The result is a full replacement for each router's table.
pub fn compute(snapshots: &BTreeMap<Address, AdjacencySnapshot>) -> BTreeMap<Address, RoutingTable> {
    let routers: BTreeSet<&str> = snapshots.keys().map(String::as_str).collect();
    let hosts: BTreeSet<&str> = snapshots
        .values()
        .flat_map(|snapshot| snapshot.destinations())
        .map(String::as_str)
        .filter(|destination| !routers.contains(destination))
        .collect();

    let adjacency = build_adjacency(snapshots);

    let mut result: BTreeMap<Address, RoutingTable> = snapshots
        .keys()
        .map(|router| (router.clone(), RoutingTable::new()))
        .collect();

    for host in hosts {
        route_towards(host, &adjacency, &mut result);
    }

    result
}

fn build_adjacency(snapshots: &BTreeMap<Address, AdjacencySnapshot>) -> Adjacency<'_> {
    let mut adjacency = Adjacency::new();
    for (router, snapshot) in snapshots {
        for destination in snapshot.direct_neighbors() {
            if destination == router {
                continue;
            }
            adjacency
                .entry(destination.as_str())
                .or_default()
                .insert(router.as_str());
        }
    }
    adjacency
}

/// Breadth-first search outward from `host`. Each router records the hop it
/// was reached from, which is its next hop towards the host. Visiting in
/// order of hop count means the first discovery is already the shortest;
/// later, equal-length discoveries never overwrite it.
fn route_towards(host: &str, adjacency: &Adjacency<'_>, result: &mut BTreeMap<Address, RoutingTable>) {
    let mut queue = VecDeque::new();

    for &router in adjacency.get(host).into_iter().flatten() {
        if record(result, router, host, host, 1) {
            queue.push_back(Visit { router, hops: 1 });
        }
    }

    while let Some(Visit { router, hops }) = queue.pop_front() {
        for &upstream in adjacency.get(router).into_iter().flatten() {
            if record(result, upstream, host, router, hops + 1) {
                queue.push_back(Visit { router: upstream, hops: hops + 1 });
            }
        }
    }
}

fn record(
    result: &mut BTreeMap<Address, RoutingTable>,
    router: &str,
    destination: &str,
    next_hop: &str,
    hops: u32,
) -> bool {
    let Some(table) = result.get_mut(router) else {
        return false;
    };
    match table.get_route(destination) {
        Some(existing) if existing.metric <= hops => false,
        _ => {
            table.add_route(destination, RouteEntry::new(next_hop, hops));
            true
        }
    }
}
