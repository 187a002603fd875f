use std::collections::{BTreeMap, BTreeSet, VecDeque};
use crate::Address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub a: Address,
    pub b: Address,
}

/// Physical layout of a simulated network: which nodes exist and which
/// point-to-point links join them. Links are undirected.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub routers: BTreeSet<Address>,
    pub hosts: BTreeSet<Address>,
    pub links: Vec<Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_router(&mut self, router: impl Into<Address>) -> &mut Self {
        self.routers.insert(router.into());
        self
    }

    pub fn add_host(&mut self, host: impl Into<Address>) -> &mut Self {
        self.hosts.insert(host.into());
        self
    }

    pub fn add_link(&mut self, a: impl Into<Address>, b: impl Into<Address>) -> &mut Self {
        let (a, b) = (a.into(), b.into());
        let exists = self
            .links
            .iter()
            .any(|link| (link.a == a && link.b == b) || (link.a == b && link.b == a));
        if !exists && a != b {
            self.links.push(Link { a, b });
        }
        self
    }

    pub fn remove_link(&mut self, a: &str, b: &str) {
        self.links
            .retain(|link| !((link.a == a && link.b == b) || (link.a == b && link.b == a)));
    }

    pub fn neighbors_of(&self, node: &str) -> BTreeSet<Address> {
        self.links
            .iter()
            .filter_map(|link| {
                if link.a == node {
                    Some(link.b.clone())
                } else if link.b == node {
                    Some(link.a.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Hop counts from `source` to every reachable node. Hosts are leaves:
    /// paths may end at a host but never pass through one.
    pub fn hop_distances(&self, source: &str) -> BTreeMap<Address, u32> {
        let mut distances = BTreeMap::new();
        let mut queue = VecDeque::from([(source.to_string(), 0u32)]);
        distances.insert(source.to_string(), 0);

        while let Some((node, hops)) = queue.pop_front() {
            if node != source && self.hosts.contains(&node) {
                continue;
            }
            for neighbor in self.neighbors_of(&node) {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor.clone(), hops + 1);
                    queue.push_back((neighbor, hops + 1));
                }
            }
        }

        distances.remove(source);
        distances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_do_not_transit() {
        let mut topo = Topology::new();
        topo.add_router("r1").add_router("r2").add_host("h1");
        topo.add_link("r1", "h1").add_link("h1", "r2");

        let distances = topo.hop_distances("r1");

        assert_eq!(distances.get("h1"), Some(&1));
        assert_eq!(distances.get("r2"), None);
    }

    #[test]
    fn test_duplicate_links_are_merged() {
        let mut topo = Topology::new();
        topo.add_link("r1", "r2").add_link("r2", "r1").add_link("r1", "r1");
        assert_eq!(topo.links.len(), 1);

        topo.remove_link("r2", "r1");
        assert!(topo.neighbors_of("r1").is_empty());
    }
}
