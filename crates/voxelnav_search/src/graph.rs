use std::{fmt::Debug, hash::Hash};

use glam::{IVec3, Vec3A};
use voxelnav::{
    NavmeshGraph, NearestMode, NodeConstraint, NodeId,
    graph::to_world,
};

/// A graph of connected nodes that searches can run on.
///
/// Positions and costs are integers so that searches are reproducible.
pub trait SearchGraph {
    /// A handle to a node. Must stay valid for as long as [`SearchGraph::generation`] does not change.
    type Node: Copy + Eq + Hash + Debug;

    /// Changes every time nodes are added, removed or modified.
    fn generation(&self) -> u64;

    /// The node closest to `point`, optionally restricted to walkable nodes.
    fn nearest(&self, point: Vec3A, walkable_only: bool) -> Option<Self::Node>;

    /// The position of a node in fixed precision, `None` if the node does not exist.
    fn position(&self, node: Self::Node) -> Option<IVec3>;

    /// Whether searches may enter the node.
    fn is_walkable(&self, node: Self::Node) -> bool;

    /// Extra cost for entering the node.
    fn penalty(&self, node: Self::Node) -> u32;

    /// Tag bits of the node.
    fn tags(&self, node: Self::Node) -> u32;

    /// Calls `visit` with every neighbor of `node` and the cost of moving there, penalties excluded.
    fn for_each_neighbor(&self, node: Self::Node, visit: &mut dyn FnMut(Self::Node, u32));

    /// Turns a node corridor into world positions from `start` to `end`.
    fn smooth_path(&self, corridor: &[Self::Node], start: Vec3A, end: Vec3A) -> Vec<Vec3A> {
        centerline(self, corridor, start, end)
    }
}

/// The path from `start` through the position of every node in `corridor` to `end`.
pub fn centerline<G: SearchGraph + ?Sized>(
    graph: &G,
    corridor: &[G::Node],
    start: Vec3A,
    end: Vec3A,
) -> Vec<Vec3A> {
    let mut path = Vec::with_capacity(corridor.len() + 2);
    path.push(start);
    path.extend(
        corridor
            .iter()
            .filter_map(|node| graph.position(*node))
            .map(to_world),
    );
    path.push(end);
    path
}

/// The cost of moving between two fixed precision positions.
///
/// Rounded up so that the straight line distance never overestimates a path.
#[inline]
pub fn edge_cost(from: IVec3, to: IVec3) -> u32 {
    from.as_vec3a().distance(to.as_vec3a()).ceil() as u32
}

impl SearchGraph for NavmeshGraph {
    type Node = NodeId;

    fn generation(&self) -> u64 {
        NavmeshGraph::generation(self)
    }

    fn nearest(&self, point: Vec3A, walkable_only: bool) -> Option<NodeId> {
        let constraint = if walkable_only {
            NodeConstraint::WALKABLE
        } else {
            NodeConstraint::NONE
        };
        self.nearest_node(point, &constraint, NearestMode::Approximate)
            .map(|nearest| nearest.node)
    }

    fn position(&self, node: NodeId) -> Option<IVec3> {
        self.node_position(node)
    }

    fn is_walkable(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|node| node.walkable)
    }

    fn penalty(&self, node: NodeId) -> u32 {
        self.node(node).map_or(0, |node| node.penalty)
    }

    fn tags(&self, node: NodeId) -> u32 {
        self.node(node).map_or(0, |node| node.tags)
    }

    fn for_each_neighbor(&self, node: NodeId, visit: &mut dyn FnMut(NodeId, u32)) {
        let (Some(from), Some(current)) = (self.node_position(node), self.node(node)) else {
            return;
        };
        for neighbor in current.connections() {
            if let Some(to) = self.node_position(neighbor) {
                visit(neighbor, edge_cost(from, to));
            }
        }
    }

    fn smooth_path(&self, corridor: &[NodeId], start: Vec3A, end: Vec3A) -> Vec<Vec3A> {
        self.string_pull(corridor, start, end)
    }
}
