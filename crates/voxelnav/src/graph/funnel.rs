use glam::Vec3A;

use super::{NavmeshGraph, NodeId};
use crate::math::triangle_area2_xz;

/// Twice the signed area of `abc` on the xz-plane, with the sign the funnel expects.
#[inline]
fn turn(a: Vec3A, b: Vec3A, c: Vec3A) -> f32 {
    -triangle_area2_xz(a, b, c)
}

#[inline]
fn same_xz(a: Vec3A, b: Vec3A) -> bool {
    const EPSILON: f32 = 1e-6;
    (a.x - b.x).abs() < EPSILON && (a.z - b.z).abs() < EPSILON
}

impl NavmeshGraph {
    /// The left and right corners of the edges crossed when walking along `corridor`.
    ///
    /// The first portal is `start` and the last one is `end`, both degenerate.
    /// Returns `None` if two consecutive nodes are not neighbors.
    pub fn portals(&self, corridor: &[NodeId], start: Vec3A, end: Vec3A) -> Option<Vec<(Vec3A, Vec3A)>> {
        let mut portals = Vec::with_capacity(corridor.len() + 1);
        portals.push((start, start));
        for pair in corridor.windows(2) {
            let (u, v) = self.shared_edge(pair[0], pair[1])?;
            let from = self.node_center(pair[0])?;
            // Orient every portal the same way as seen from the node we leave.
            if turn(from, u, v) < 0.0 {
                portals.push((v, u));
            } else {
                portals.push((u, v));
            }
        }
        portals.push((end, end));
        Some(portals)
    }

    /// Shortens a path through a node corridor with the simple stupid funnel algorithm.
    ///
    /// The result starts at `start`, ends at `end` and bends only at portal corners.
    /// If `corridor` is not connected, the path falls back to the node centers.
    pub fn string_pull(&self, corridor: &[NodeId], start: Vec3A, end: Vec3A) -> Vec<Vec3A> {
        let Some(portals) = self.portals(corridor, start, end) else {
            tracing::warn!("Corridor is not connected, skipping string pulling");
            let mut path = vec![start];
            path.extend(corridor.iter().filter_map(|id| self.node_center(*id)));
            path.push(end);
            return path;
        };
        funnel(&portals)
    }
}

/// Runs the funnel over `(left, right)` portals.
pub(crate) fn funnel(portals: &[(Vec3A, Vec3A)]) -> Vec<Vec3A> {
    let Some(&(start, _)) = portals.first() else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut apex = start;
    let (mut left, mut right) = portals[0];
    let (mut left_index, mut right_index) = (0, 0);

    let mut i = 1;
    while i < portals.len() {
        let (portal_left, portal_right) = portals[i];

        // Tighten the right side.
        if turn(apex, right, portal_right) <= 0.0 {
            if same_xz(apex, right) || turn(apex, left, portal_right) > 0.0 {
                right = portal_right;
                right_index = i;
            } else {
                // Right crossed over left, the left corner becomes the new apex.
                apex = left;
                let apex_index = left_index;
                path.push(apex);
                right = apex;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        // Tighten the left side.
        if turn(apex, left, portal_left) >= 0.0 {
            if same_xz(apex, left) || turn(apex, right, portal_left) < 0.0 {
                left = portal_left;
                left_index = i;
            } else {
                apex = right;
                let apex_index = right_index;
                path.push(apex);
                left = apex;
                left_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }
        i += 1;
    }

    if let Some(&(end, _)) = portals.last() {
        if path.last().is_none_or(|last| !same_xz(*last, end)) {
            path.push(end);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NearestMode, NodeConstraint, tests::grid_mesh};

    fn corridor(graph: &NavmeshGraph, points: &[Vec3A]) -> Vec<NodeId> {
        // Walks the graph greedily from node to node under each sample point.
        let mut corridor: Vec<NodeId> = Vec::new();
        for point in points {
            let node = graph
                .nearest_node(*point, &NodeConstraint::NONE, NearestMode::Approximate)
                .unwrap()
                .node;
            if corridor.last() != Some(&node) {
                corridor.push(node);
            }
        }
        corridor
    }

    #[test]
    fn straight_corridor_is_a_single_segment() {
        let graph = NavmeshGraph::from_polygon_mesh(&grid_mesh(4));
        let start = Vec3A::new(0.3, 0.0, 0.2);
        let end = Vec3A::new(3.6, 0.0, 3.1);
        let samples: Vec<Vec3A> = (0..=200).map(|i| start.lerp(end, i as f32 / 200.0)).collect();
        let corridor = corridor(&graph, &samples);
        assert!(corridor.len() > 4);
        assert_eq!(graph.string_pull(&corridor, start, end), vec![start, end]);
    }

    #[test]
    fn path_bends_around_a_corner() {
        // An L-shaped corridor: along x = 0.5 towards -z, then along z = 0.5 towards +x, around (1, 1).
        let portals = [
            (Vec3A::new(0.5, 0.0, 2.5), Vec3A::new(0.5, 0.0, 2.5)),
            (Vec3A::new(1.0, 0.0, 1.0), Vec3A::new(0.0, 0.0, 1.0)),
            (Vec3A::new(1.0, 0.0, 1.0), Vec3A::new(1.0, 0.0, 0.0)),
            (Vec3A::new(2.5, 0.0, 0.5), Vec3A::new(2.5, 0.0, 0.5)),
        ];
        let path = funnel(&portals);
        assert_eq!(
            path,
            vec![
                Vec3A::new(0.5, 0.0, 2.5),
                Vec3A::new(1.0, 0.0, 1.0),
                Vec3A::new(2.5, 0.0, 0.5)
            ]
        );
    }

    #[test]
    fn disconnected_corridor_uses_centers() {
        let graph = NavmeshGraph::from_polygon_mesh(&grid_mesh(4));
        let ids: Vec<NodeId> = graph.nodes().map(|(id, _)| id).collect();
        let corridor = [ids[0], ids[31]];
        let path = graph.string_pull(&corridor, Vec3A::ZERO, Vec3A::splat(4.0));
        assert_eq!(path.len(), 4);
    }
}
