use std::{collections::HashMap, hash::Hash};

use glam::Vec3A;

use crate::{SearchError, SearchId};

/// Where a flood came from when it reached a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FloodEntry<N> {
    pub(crate) parent: Option<N>,
    pub(crate) cost: u32,
}

/// The result of a finished [`SearchPolicy::Flood`](crate::SearchPolicy::Flood).
///
/// Maps every node the flood reached to the node it was reached from.
/// Immutable once built, share it with an [`Arc`](std::sync::Arc) between any number of tracers.
#[derive(Debug, Clone)]
pub struct FloodField<N> {
    origin: N,
    origin_point: Vec3A,
    search: SearchId,
    generation: u64,
    entries: HashMap<N, FloodEntry<N>>,
}

impl<N: Copy + Eq + Hash> FloodField<N> {
    pub(crate) fn new(
        origin: N,
        origin_point: Vec3A,
        search: SearchId,
        generation: u64,
        entries: HashMap<N, FloodEntry<N>>,
    ) -> Self {
        Self {
            origin,
            origin_point,
            search,
            generation,
            entries,
        }
    }

    /// The node the flood started from.
    pub fn origin(&self) -> N {
        self.origin
    }

    /// The point the flood started from.
    pub fn origin_point(&self) -> Vec3A {
        self.origin_point
    }

    /// The search that computed the flood.
    pub fn search(&self) -> SearchId {
        self.search
    }

    /// The graph generation the flood was computed on.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The number of nodes reached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the flood did not reach any node. Never true for a completed flood.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the flood reached `node`.
    pub fn contains(&self, node: N) -> bool {
        self.entries.contains_key(&node)
    }

    /// The cost of reaching `node` from the origin.
    pub fn cost(&self, node: N) -> Option<u32> {
        self.entries.get(&node).map(|entry| entry.cost)
    }

    /// The node `node` was reached from. `None` for the origin and for nodes that were not reached.
    pub fn parent(&self, node: N) -> Option<N> {
        self.entries.get(&node).and_then(|entry| entry.parent)
    }

    /// The nodes from `node` back to the origin, both included.
    pub fn trace(&self, node: N, max_hops: usize) -> Result<Vec<N>, SearchError> {
        if !self.contains(node) {
            return Err(SearchError::NoPath);
        }
        let mut nodes = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if nodes.len() > max_hops {
                return Err(SearchError::TraceOverflow(max_hops));
            }
            nodes.push(parent);
            current = parent;
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> FloodField<u32> {
        // 0 <- 1 <- 2 <- 3, and 4 hanging off 1.
        let entries = [
            (0, None, 0),
            (1, Some(0), 10),
            (2, Some(1), 20),
            (3, Some(2), 30),
            (4, Some(1), 15),
        ]
        .into_iter()
        .map(|(node, parent, cost)| (node, FloodEntry { parent, cost }))
        .collect();
        FloodField::new(0, Vec3A::ZERO, SearchId(1), 7, entries)
    }

    #[test]
    fn trace_follows_parents_to_the_origin() {
        let flood = chain();
        assert_eq!(flood.trace(3, 100), Ok(vec![3, 2, 1, 0]));
        assert_eq!(flood.trace(4, 100), Ok(vec![4, 1, 0]));
        assert_eq!(flood.trace(0, 100), Ok(vec![0]));
        assert_eq!(flood.cost(4), Some(15));
        assert_eq!(flood.generation(), 7);
    }

    #[test]
    fn unreached_nodes_have_no_path() {
        assert_eq!(chain().trace(9, 100), Err(SearchError::NoPath));
    }

    #[test]
    fn long_chains_overflow() {
        assert_eq!(chain().trace(3, 2), Err(SearchError::TraceOverflow(2)));
    }
}
