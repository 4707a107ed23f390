use glam::Vec3A;

use super::{NavmeshGraph, NearestMode, NodeConstraint, NodeId};
use crate::math::{point_in_triangle_xz, segment_intersection_xz};

/// Where a [`NavmeshGraph::linecast`] was blocked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinecastHit {
    /// The point where the line left the walkable surface.
    pub point: Vec3A,
    /// The last node the line crossed. `None` if there was no node under the origin.
    pub node: Option<NodeId>,
    /// The blocking edge, if the line hit one.
    pub edge: Option<(Vec3A, Vec3A)>,
}

impl NavmeshGraph {
    /// Walks the mesh on the xz-plane from the node under `origin` towards `end`.
    ///
    /// Returns `None` if `end` can be reached in a straight line, otherwise the point where the line
    /// crosses a mesh boundary edge or enters a node rejected by `constraint`.
    pub fn linecast(
        &self,
        origin: Vec3A,
        end: Vec3A,
        constraint: &NodeConstraint,
    ) -> Option<LinecastHit> {
        let Some(start) = self.nearest_node(origin, constraint, NearestMode::Approximate) else {
            return Some(LinecastHit {
                point: origin,
                node: None,
                edge: None,
            });
        };

        let mut current = start.node;
        let mut previous: Option<NodeId> = None;
        let mut entry = 0.0_f32;
        let mut position = start.position;

        // Every step enters a new node, so the walk visits each node at most once per line.
        for _ in 0..=self.node_count() {
            let node = &self.nodes[current];
            let [a, b, c] = self.corners(node);
            if point_in_triangle_xz(end, a, b, c) {
                return None;
            }

            let corners = [a, b, c];
            let exit = (0..3)
                .filter(|&i| previous.is_none() || node.neighbors[i] != previous)
                .filter_map(|i| {
                    let (u, v) = (corners[i], corners[(i + 1) % 3]);
                    let (s, t) = segment_intersection_xz(origin, end, u, v)?;
                    (s >= entry).then_some((i, s, t))
                })
                .max_by(|l, r| l.1.total_cmp(&r.1));

            let Some((edge, s, t)) = exit else {
                return Some(LinecastHit {
                    point: position,
                    node: Some(current),
                    edge: None,
                });
            };
            let (u, v) = (corners[edge], corners[(edge + 1) % 3]);
            position = u.lerp(v, t);

            match node.neighbors[edge] {
                Some(next) if constraint.allows(&self.nodes[next]) => {
                    previous = Some(current);
                    current = next;
                    entry = s;
                }
                _ => {
                    return Some(LinecastHit {
                        point: position,
                        node: Some(current),
                        edge: Some((u, v)),
                    });
                }
            }
        }
        tracing::warn!("Linecast did not terminate, treating it as blocked");
        Some(LinecastHit {
            point: position,
            node: Some(current),
            edge: None,
        })
    }
}
