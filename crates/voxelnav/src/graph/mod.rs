//! The navmesh graph: one node per triangle, connected across shared edges.
//!
//! Vertices are stored in fixed precision ([`PRECISION`] units per world unit) so that
//! equal positions from separate builds compare equal. Nodes live in a [`SlotMap`],
//! which keeps their [`NodeId`]s valid across [`NavmeshGraph::update_area`].

mod bv_tree;
mod export;
mod funnel;
mod linecast;
mod update;

use std::{collections::HashMap, sync::Arc};

use glam::{IVec3, Vec3A};
use parking_lot::RwLock;
use slotmap::{SecondaryMap, SlotMap};

use crate::{
    Aabb3d, AreaType, BuildOutcome, NavmeshBuildError, NavmeshConfig, NavmeshInput,
    PolygonNavmesh, RegionId, build_navmesh,
    math::{TriangleVertices as _, closest_point_on_triangle, point_in_triangle_xz, triangle_height_at},
};

pub use bv_tree::{BvLeaf, BvTree};
pub use linecast::LinecastHit;
pub use update::{GraphUpdate, UpdateSummary};

/// Integer units per world unit of navmesh vertices.
pub const PRECISION: i32 = 1000;

/// Converts a world position into fixed precision.
#[inline]
pub fn to_fixed(position: Vec3A) -> IVec3 {
    (position * PRECISION as f32).round().as_ivec3()
}

/// Converts a fixed precision position back into world space.
#[inline]
pub fn to_world(position: IVec3) -> Vec3A {
    position.as_vec3a() / PRECISION as f32
}

slotmap::new_key_type! {
    /// A key for a node of a [`NavmeshGraph`].
    pub struct NodeId;
}

/// A triangle of the navmesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NavmeshNode {
    /// Indices into [`NavmeshGraph::vertices`].
    pub vertices: [u32; 3],
    /// The area the triangle was built from.
    pub area: AreaType,
    /// The region the triangle was built from.
    pub region: RegionId,
    /// Arbitrary tag bits, tested by [`NodeConstraint::tags`].
    pub tags: u32,
    /// Extra cost for entering this node.
    pub penalty: u32,
    /// Whether searches may enter this node.
    pub walkable: bool,
    /// The node across the edge from `vertices[i]` to `vertices[(i + 1) % 3]`, if any.
    pub neighbors: [Option<NodeId>; 3],
}

impl NavmeshNode {
    fn new(vertices: [u32; 3], area: AreaType, region: RegionId) -> Self {
        Self {
            vertices,
            area,
            region,
            tags: 0,
            penalty: 0,
            walkable: true,
            neighbors: [None; 3],
        }
    }

    /// The vertex indices of edge `i`.
    #[inline]
    pub fn edge(&self, i: usize) -> (u32, u32) {
        (self.vertices[i], self.vertices[(i + 1) % 3])
    }

    /// The neighboring nodes, skipping mesh boundary edges.
    pub fn connections(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors.iter().flatten().copied()
    }
}

/// A filter for node queries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeConstraint {
    /// Only accept walkable nodes.
    pub walkable_only: bool,
    /// Only accept nodes sharing at least one of these tag bits.
    pub tags: Option<u32>,
    /// Only accept nodes of this area.
    pub area: Option<AreaType>,
}

impl NodeConstraint {
    /// Accepts every node.
    pub const NONE: Self = Self {
        walkable_only: false,
        tags: None,
        area: None,
    };

    /// Accepts walkable nodes.
    pub const WALKABLE: Self = Self {
        walkable_only: true,
        tags: None,
        area: None,
    };

    /// Whether `node` passes the constraint.
    pub fn allows(&self, node: &NavmeshNode) -> bool {
        (!self.walkable_only || node.walkable)
            && self.tags.is_none_or(|tags| node.tags & tags != 0)
            && self.area.is_none_or(|area| node.area == area)
    }
}

/// How [`NavmeshGraph::nearest_node`] resolves a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum NearestMode {
    /// Picks the node directly above or below the point, vertically closest.
    /// Falls back to [`NearestMode::Exact`] when no node covers the point on the xz-plane.
    #[default]
    Approximate,
    /// Picks the node with the closest point on its triangle.
    Exact,
}

/// The result of [`NavmeshGraph::nearest_node`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestNode {
    /// The node that was found.
    pub node: NodeId,
    /// The point on the node's triangle that was matched.
    pub position: Vec3A,
    /// Squared distance from the query point to [`NearestNode::position`].
    pub distance_squared: f32,
}

/// What a successful [`NavmeshGraph::scan`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// No geometry intersected the bounds. The graph is valid but has no nodes.
    Empty,
    /// The navmesh was built.
    Scanned {
        /// The number of nodes in the graph.
        nodes: usize,
    },
}

/// A navmesh graph behind a lock. Scans and updates take the write lock, queries and searches read.
pub type SharedGraph = Arc<RwLock<NavmeshGraph>>;

/// The navigation graph built from a [`PolygonNavmesh`].
#[derive(Debug, Clone, Default)]
pub struct NavmeshGraph {
    vertices: Vec<IVec3>,
    nodes: SlotMap<NodeId, NavmeshNode>,
    bv_tree: BvTree<NodeId>,
    leaves: SecondaryMap<NodeId, BvLeaf>,
    config: Option<NavmeshConfig>,
    input: NavmeshInput,
    generation: u64,
}

impl NavmeshGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the graph for sharing between searches.
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Creates nodes for every triangle of `mesh` and connects triangles sharing an edge.
    pub fn from_polygon_mesh(mesh: &PolygonNavmesh) -> Self {
        let mut graph = Self {
            vertices: mesh.world_vertices().into_iter().map(to_fixed).collect(),
            ..Default::default()
        };
        let ids: Vec<NodeId> = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(i, triangle)| {
                graph.nodes.insert(NavmeshNode::new(
                    triangle.to_array(),
                    mesh.areas.get(i).copied().unwrap_or_default(),
                    mesh.regions.get(i).copied().unwrap_or_default(),
                ))
            })
            .collect();
        graph.connect_nodes();

        let items: Vec<(NodeId, Aabb3d)> = ids
            .iter()
            .map(|&id| (id, graph.corners(&graph.nodes[id]).aabb()))
            .collect();
        let (bv_tree, leaves) = BvTree::build(items);
        graph.bv_tree = bv_tree;
        for (id, leaf) in ids.into_iter().zip(leaves) {
            graph.leaves.insert(id, leaf);
        }
        graph
    }

    /// Builds the navmesh for `input` and replaces the whole graph with it.
    ///
    /// On error the graph is left as it was.
    pub fn scan(
        &mut self,
        input: NavmeshInput,
        config: NavmeshConfig,
    ) -> Result<ScanStatus, NavmeshBuildError> {
        let outcome = build_navmesh(&input, &config)?;
        let generation = self.generation + 1;
        let status = match outcome {
            BuildOutcome::NothingToScan => {
                *self = Self::default();
                ScanStatus::Empty
            }
            BuildOutcome::Built(mesh) => {
                *self = Self::from_polygon_mesh(&mesh);
                ScanStatus::Scanned {
                    nodes: self.nodes.len(),
                }
            }
        };
        self.config = Some(config);
        self.input = input;
        self.generation = generation;
        tracing::info!(?status, generation, "Scanned navmesh graph");
        Ok(status)
    }

    /// Rebuilds the adjacency of every node. Edges are matched by vertex pair in either winding.
    fn connect_nodes(&mut self) {
        let mut edges: HashMap<(u32, u32), Vec<(NodeId, usize)>> = HashMap::new();
        for (id, node) in &self.nodes {
            for i in 0..3 {
                let (a, b) = node.edge(i);
                edges.entry((a.min(b), a.max(b))).or_default().push((id, i));
            }
        }
        for node in self.nodes.values_mut() {
            node.neighbors = [None; 3];
        }
        for sides in edges.values() {
            // More than two triangles on one edge is non-manifold, those stay unconnected.
            let &[(a, edge_a), (b, edge_b)] = sides.as_slice() else {
                continue;
            };
            self.nodes[a].neighbors[edge_a] = Some(b);
            self.nodes[b].neighbors[edge_b] = Some(a);
        }
    }

    /// Bumped on every scan and update. Stored search results compare against it to detect staleness.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The config of the last scan.
    pub fn config(&self) -> Option<&NavmeshConfig> {
        self.config.as_ref()
    }

    /// The geometry of the last scan or geometry update.
    pub fn input(&self) -> &NavmeshInput {
        &self.input
    }

    /// All vertices in fixed precision.
    pub fn vertices(&self) -> &[IVec3] {
        &self.vertices
    }

    /// A node by id. `None` if it was removed by an update.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&NavmeshNode> {
        self.nodes.get(id)
    }

    /// Mutable access to a node. Geometry and adjacency are not exposed.
    ///
    /// Bumps the [generation](NavmeshGraph::generation) whenever the node exists.
    pub fn node_mut(&mut self, id: NodeId) -> Option<NodeProperties<'_>> {
        let node = self.nodes.get_mut(id)?;
        self.generation += 1;
        Some(NodeProperties {
            tags: &mut node.tags,
            penalty: &mut node.penalty,
            walkable: &mut node.walkable,
        })
    }

    /// Iterates all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NavmeshNode)> {
        self.nodes.iter()
    }

    /// The number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The bounding volume tree over all nodes.
    pub fn bv_tree(&self) -> &BvTree<NodeId> {
        &self.bv_tree
    }

    fn corners(&self, node: &NavmeshNode) -> [Vec3A; 3] {
        node.vertices.map(|i| to_world(self.vertices[i as usize]))
    }

    /// The corners of a node's triangle in world space.
    pub fn node_corners(&self, id: NodeId) -> Option<[Vec3A; 3]> {
        self.nodes.get(id).map(|node| self.corners(node))
    }

    /// The centroid of a node's triangle in fixed precision.
    pub fn node_position(&self, id: NodeId) -> Option<IVec3> {
        self.nodes.get(id).map(|node| {
            let [a, b, c] = node.vertices.map(|i| self.vertices[i as usize]);
            (a + b + c) / 3
        })
    }

    /// The centroid of a node's triangle in world space.
    pub fn node_center(&self, id: NodeId) -> Option<Vec3A> {
        self.node_corners(id).map(|[a, b, c]| (a + b + c) / 3.0)
    }

    /// The two corners `a` and `b` shares with its neighbor `b`, in world space.
    pub fn shared_edge(&self, a: NodeId, b: NodeId) -> Option<(Vec3A, Vec3A)> {
        let node = self.nodes.get(a)?;
        let edge = node.neighbors.iter().position(|n| *n == Some(b))?;
        let (u, v) = node.edge(edge);
        Some((
            to_world(self.vertices[u as usize]),
            to_world(self.vertices[v as usize]),
        ))
    }

    /// Finds the node closest to `point` among those allowed by `constraint`.
    pub fn nearest_node(
        &self,
        point: Vec3A,
        constraint: &NodeConstraint,
        mode: NearestMode,
    ) -> Option<NearestNode> {
        if mode == NearestMode::Approximate {
            if let Some(nearest) = self.nearest_below_or_above(point, constraint) {
                return Some(nearest);
            }
        }
        self.nearest_exact(point, constraint)
    }

    fn nearest_below_or_above(&self, point: Vec3A, constraint: &NodeConstraint) -> Option<NearestNode> {
        let mut best: Option<NearestNode> = None;
        self.bv_tree.query_point_xz(point, |&id| {
            let node = &self.nodes[id];
            if !constraint.allows(node) {
                return;
            }
            let [a, b, c] = self.corners(node);
            if !point_in_triangle_xz(point, a, b, c) {
                return;
            }
            let Some(y) = triangle_height_at(point, a, b, c) else {
                return;
            };
            let position = Vec3A::new(point.x, y, point.z);
            let distance_squared = position.distance_squared(point);
            if best.is_none_or(|best| distance_squared < best.distance_squared) {
                best = Some(NearestNode {
                    node: id,
                    position,
                    distance_squared,
                });
            }
        });
        best
    }

    fn nearest_exact(&self, point: Vec3A, constraint: &NodeConstraint) -> Option<NearestNode> {
        let mut best_position = Vec3A::ZERO;
        let mut best_distance = f32::INFINITY;
        let (&node, distance_squared) = self.bv_tree.nearest(point, |&id| {
            let node = &self.nodes[id];
            if !constraint.allows(node) {
                return None;
            }
            let [a, b, c] = self.corners(node);
            let position = closest_point_on_triangle(point, a, b, c);
            let distance = position.distance_squared(point);
            if distance < best_distance {
                best_distance = distance;
                best_position = position;
            }
            Some(distance)
        })?;
        Some(NearestNode {
            node,
            position: best_position,
            distance_squared,
        })
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }
}

/// The mutable properties of a node, see [`NavmeshGraph::node_mut`].
#[derive(Debug)]
pub struct NodeProperties<'a> {
    /// Tag bits.
    pub tags: &'a mut u32,
    /// Extra cost for entering the node.
    pub penalty: &'a mut u32,
    /// Whether searches may enter the node.
    pub walkable: &'a mut bool,
}
