use std::collections::HashMap;

use glam::IVec3;

use super::{NavmeshGraph, NavmeshNode, NodeId, to_fixed};
use crate::{
    Aabb3d, AreaType, BuildOutcome, NavmeshBuildError, NavmeshInput, PolygonNavmesh, RegionId,
    build_navmesh, math::TriangleVertices as _,
};

/// A change to a part of a [`NavmeshGraph`], applied with [`NavmeshGraph::update_area`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphUpdate {
    /// The affected volume.
    pub bounds: Aabb3d,
    /// Replaces the scanned geometry before rebuilding. Implies [`GraphUpdate::rescan`].
    pub geometry: Option<NavmeshInput>,
    /// Rebuilds the navmesh inside [`GraphUpdate::bounds`].
    pub rescan: bool,
    /// Sets the walkability of the nodes inside the bounds.
    pub set_walkable: Option<bool>,
    /// Added to the penalty of the nodes inside the bounds, saturating.
    pub add_penalty: i32,
    /// Replaces the tags of the nodes inside the bounds.
    pub set_tags: Option<u32>,
}

impl GraphUpdate {
    /// An update that only rebuilds the geometry inside `bounds`.
    pub fn rescan(bounds: Aabb3d) -> Self {
        Self {
            bounds,
            rescan: true,
            ..Default::default()
        }
    }
}

/// What [`NavmeshGraph::update_area`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    /// Nodes that kept their id through a rebuild.
    pub kept: usize,
    /// Nodes that were removed by a rebuild.
    pub removed: usize,
    /// Nodes that were added by a rebuild.
    pub added: usize,
    /// Nodes inside the bounds whose properties were modified.
    pub modified: usize,
}

/// Triangle corners in a canonical order, so equal triangles compare equal regardless of winding.
type TriangleKey = [IVec3; 3];

fn triangle_key(mut corners: [IVec3; 3]) -> TriangleKey {
    corners.sort_unstable_by_key(|c| (c.x, c.z, c.y));
    corners
}

impl NavmeshGraph {
    /// Applies `update` to the nodes overlapping its bounds.
    ///
    /// A rescan rebuilds the whole navmesh from the stored geometry, or from [`GraphUpdate::geometry`],
    /// and splices the result into the graph. Nodes overlapping the bounds are always replaced. Nodes outside of them whose triangle is unchanged
    /// keep their [`NodeId`], their tags and their penalty. The bounding volume tree is patched leaf by leaf.
    ///
    /// On error the graph is left as it was.
    pub fn update_area(&mut self, update: &GraphUpdate) -> Result<UpdateSummary, NavmeshBuildError> {
        let _span = tracing::debug_span!("update_area", bounds = ?update.bounds).entered();
        let mut summary = UpdateSummary::default();

        if update.rescan || update.geometry.is_some() {
            let config = self.config.clone().ok_or(NavmeshBuildError::NotScanned)?;
            let input = update
                .geometry
                .clone()
                .unwrap_or_else(|| self.input.clone());
            let mesh = match build_navmesh(&input, &config)? {
                BuildOutcome::NothingToScan => PolygonNavmesh::default(),
                BuildOutcome::Built(mesh) => mesh,
            };
            self.input = input;
            self.replace_triangles(&mesh, &update.bounds, &mut summary);
        }

        let mut inside = Vec::new();
        self.bv_tree
            .query_aabb(&update.bounds, |&id| inside.push(id));
        let modifies = update.set_walkable.is_some() || update.add_penalty != 0 || update.set_tags.is_some();
        if modifies {
            for id in inside {
                let node = &mut self.nodes[id];
                if let Some(walkable) = update.set_walkable {
                    node.walkable = walkable;
                }
                node.penalty = node.penalty.saturating_add_signed(update.add_penalty);
                if let Some(tags) = update.set_tags {
                    node.tags = tags;
                }
                summary.modified += 1;
            }
        }

        self.bump_generation();
        tracing::debug!(?summary, generation = self.generation, "Updated navmesh graph");
        Ok(summary)
    }

    fn replace_triangles(&mut self, mesh: &PolygonNavmesh, bounds: &Aabb3d, summary: &mut UpdateSummary) {
        let vertices: Vec<IVec3> = mesh.world_vertices().into_iter().map(to_fixed).collect();
        let mut fresh: HashMap<TriangleKey, usize> = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(i, triangle)| (triangle_key(triangle.to_array().map(|v| vertices[v as usize])), i))
            .collect();

        // Decide which nodes survive before touching anything.
        let mut kept: Vec<(NodeId, usize)> = Vec::new();
        let mut removed: Vec<NodeId> = Vec::new();
        for (id, node) in &self.nodes {
            let corners = self.corners(node);
            let outside = !corners.aabb().intersects(bounds);
            let key = triangle_key(node.vertices.map(|v| self.vertices[v as usize]));
            match fresh.remove(&key) {
                Some(triangle) if outside => kept.push((id, triangle)),
                Some(triangle) => {
                    removed.push(id);
                    fresh.insert(key, triangle);
                }
                None => removed.push(id),
            }
        }

        for id in removed {
            if let Some(leaf) = self.leaves.remove(id) {
                self.bv_tree.remove(leaf);
            }
            self.nodes.remove(id);
            summary.removed += 1;
        }

        // Kept nodes may have been renumbered into other regions, their geometry is identical.
        let lookup: HashMap<IVec3, u32> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, i as u32))
            .collect();
        for (id, triangle) in kept {
            let node = &mut self.nodes[id];
            node.vertices = node
                .vertices
                .map(|v| lookup.get(&self.vertices[v as usize]).copied().unwrap_or(v));
            node.region = mesh.regions.get(triangle).copied().unwrap_or_default();
            summary.kept += 1;
        }

        let mut added: Vec<usize> = fresh.into_values().collect();
        added.sort_unstable();
        self.vertices = vertices;
        for triangle in added {
            let node = NavmeshNode::new(
                mesh.triangles[triangle].to_array(),
                mesh.areas.get(triangle).copied().unwrap_or(AreaType::DEFAULT_WALKABLE),
                mesh.regions.get(triangle).copied().unwrap_or(RegionId::NONE),
            );
            let aabb = self.corners(&node).aabb();
            let id = self.nodes.insert(node);
            let leaf = self.bv_tree.insert(id, aabb);
            self.leaves.insert(id, leaf);
            summary.added += 1;
        }

        self.connect_nodes();
        tracing::debug!(
            kept = summary.kept,
            removed = summary.removed,
            added = summary.added,
            "Replaced triangles"
        );
    }

    /// The world space bounds of all nodes, `None` for an empty graph.
    pub fn bounds(&self) -> Option<Aabb3d> {
        self.bv_tree.bounds()
    }

    /// Whether every node's leaf in the bounding volume tree matches its triangle.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.bv_tree.len() == self.nodes.len()
            && self.nodes.iter().all(|(id, node)| {
                let aabb = self.corners(node).aabb();
                let mut found = false;
                self.bv_tree.query_aabb(&aabb, |other| found |= *other == id);
                found && node.vertices.iter().all(|v| (*v as usize) < self.vertices.len())
            })
            && self
                .vertices
                .iter()
                .all(|v| to_fixed(super::to_world(*v)) == *v)
    }
}
