// ── Adjacency graph ──
//
// Symmetric "can walk directly between" relation over areas. Built once
// from the directed config map; every edge is stored both ways.

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::model::AreaId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyGraph {
    edges: BTreeMap<AreaId, BTreeSet<AreaId>>,
}

impl AdjacencyGraph {
    pub fn from_directed(input: &IndexMap<AreaId, Vec<AreaId>>) -> Self {
        let mut edges: BTreeMap<AreaId, BTreeSet<AreaId>> = BTreeMap::new();
        for (area, neighbours) in input {
            for neighbour in neighbours {
                if neighbour == area {
                    continue;
                }
                edges
                    .entry(area.clone())
                    .or_default()
                    .insert(neighbour.clone());
                edges
                    .entry(neighbour.clone())
                    .or_default()
                    .insert(area.clone());
            }
        }
        Self { edges }
    }

    /// Ordered neighbours; empty for unknown areas.
    pub fn neighbors<'a>(&'a self, area: &str) -> impl Iterator<Item = &'a AreaId> + use<'a> {
        self.edges.get(area).into_iter().flatten()
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.edges
            .get(a)
            .is_some_and(|set| set.iter().any(|n| n.as_str() == b))
    }

    /// Whether `to` is reachable from `from` in at most `max_hops` edges.
    pub fn within_hops(&self, from: &str, to: &str, max_hops: usize) -> bool {
        if from == to {
            return true;
        }
        let mut seen: BTreeSet<&str> = BTreeSet::from([from]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from, 0)]);
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for next in self.neighbors(current) {
                if next.as_str() == to {
                    return true;
                }
                if seen.insert(next.as_str()) {
                    queue.push_back((next.as_str(), depth + 1));
                }
            }
        }
        false
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum::<usize>() / 2
    }
}
