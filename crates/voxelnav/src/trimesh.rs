//! Triangle soup used as input for [`Heightfield`](crate::Heightfield) rasterization.

use glam::{UVec3, Vec3A};

use crate::{
    math::{Aabb3d, TriangleIndices as _},
    span::AreaType,
};

/// An indexed triangle list with one area per triangle.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMesh {
    /// Vertex positions in world space.
    pub vertices: Vec<Vec3A>,
    /// One entry per triangle, indexing into `vertices`.
    pub indices: Vec<UVec3>,
    /// The area of each triangle, parallel to `indices`.
    pub area_types: Vec<AreaType>,
}

impl TriMesh {
    /// Creates a trimesh from flat vertex and index arrays, the way meshes are usually exchanged.
    /// A trailing partial triangle is ignored. Every triangle starts out as [`AreaType::NOT_WALKABLE`].
    pub fn from_arrays(vertices: &[[f32; 3]], indices: &[u32]) -> Self {
        let indices: Vec<UVec3> = indices
            .chunks_exact(3)
            .map(|triangle| UVec3::new(triangle[0], triangle[1], triangle[2]))
            .collect();
        Self {
            vertices: vertices.iter().map(|v| Vec3A::from(*v)).collect(),
            area_types: vec![AreaType::NOT_WALKABLE; indices.len()],
            indices,
        }
    }

    /// Appends the triangles of `other`, rebasing its indices onto this mesh's vertices.
    ///
    /// # Panics
    ///
    /// Panics if the combined mesh would have more than `u32::MAX` vertices.
    pub fn extend(&mut self, other: TriMesh) {
        assert!(
            u32::try_from(self.vertices.len() + other.vertices.len()).is_ok(),
            "Cannot extend a trimesh beyond 2^32 vertices"
        );
        let offset = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices
            .extend(other.indices.into_iter().map(|triangle| triangle + offset));
        self.area_types.extend(other.area_types);
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The bounds of all vertices, or `None` without vertices.
    pub fn compute_aabb(&self) -> Option<Aabb3d> {
        Aabb3d::from_verts(&self.vertices)
    }

    /// The three corners of the triangle at `index`.
    #[inline]
    pub fn triangle(&self, index: usize) -> [Vec3A; 3] {
        let indices = self.indices[index];
        [
            self.vertices[indices.x as usize],
            self.vertices[indices.y as usize],
            self.vertices[indices.z as usize],
        ]
    }

    /// Gives [`AreaType::DEFAULT_WALKABLE`] to every unwalkable triangle whose slope is below `max_slope` radians.
    ///
    /// Triangles that already carry a walkable area keep it.
    pub fn mark_walkable_triangles(&mut self, max_slope: f32) {
        let min_up = max_slope.cos();
        self.area_types
            .resize(self.indices.len(), AreaType::NOT_WALKABLE);
        for (triangle, area) in self.indices.iter().zip(&mut self.area_types) {
            if !area.is_walkable() && triangle.normal(&self.vertices).y > min_up {
                *area = AreaType::DEFAULT_WALKABLE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slope(height: f32) -> TriMesh {
        TriMesh::from_arrays(
            &[[0.0, 0.0, 0.0], [0.0, height, 1.0], [1.0, 0.0, 0.0]],
            &[0, 1, 2],
        )
    }

    #[test]
    fn flat_triangle_is_walkable() {
        let mut mesh = slope(0.0);
        mesh.mark_walkable_triangles(30.0_f32.to_radians());
        assert_eq!(mesh.area_types, vec![AreaType::DEFAULT_WALKABLE]);
    }

    #[test]
    fn steep_triangle_is_not_walkable() {
        let mut mesh = slope(2.0);
        mesh.mark_walkable_triangles(30.0_f32.to_radians());
        assert_eq!(mesh.area_types, vec![AreaType::NOT_WALKABLE]);
    }

    #[test]
    fn downward_facing_triangle_is_not_walkable() {
        let mut mesh = TriMesh::from_arrays(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            &[0, 1, 2],
        );
        mesh.mark_walkable_triangles(30.0_f32.to_radians());
        assert_eq!(mesh.area_types, vec![AreaType::NOT_WALKABLE]);
    }

    #[test]
    fn extend_offsets_indices() {
        let mut mesh = slope(0.0);
        mesh.extend(slope(0.0));
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices[1], UVec3::new(3, 4, 5));
        assert_eq!(mesh.area_types.len(), 2);
    }
}
