//! Heightmap terrain, downsampled into a [`TriMesh`] before rasterization.

use glam::{UVec3, Vec3A};

use crate::{Aabb3d, AreaType, TriMesh};

/// A regular heightmap.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Terrain {
    /// Normalized heights in `[0, 1]`, row major, `resolution_x` samples per row.
    pub heights: Vec<f32>,
    /// Number of samples along the x-axis.
    pub resolution_x: u32,
    /// Number of samples along the z-axis.
    pub resolution_z: u32,
    /// World position of the sample at `(0, 0)` with height 0.
    pub position: Vec3A,
    /// World size of the terrain. `size.y` scales the normalized heights.
    pub size: Vec3A,
}

impl Terrain {
    /// The normalized height at a sample. Missing samples read as 0.
    #[inline]
    pub fn sample(&self, x: u32, z: u32) -> f32 {
        self.heights
            .get(z as usize * self.resolution_x as usize + x as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// The world space bounds of the terrain.
    pub fn aabb(&self) -> Aabb3d {
        Aabb3d {
            min: self.position,
            max: self.position + self.size,
        }
    }

    /// Triangulates the heightmap, taking every `sample_size`th sample along both axes.
    /// The last row and column are always included so the terrain keeps its full extent.
    pub fn to_trimesh(&self, sample_size: u32) -> TriMesh {
        if self.resolution_x < 2 || self.resolution_z < 2 {
            return TriMesh::default();
        }
        let stride = sample_size.max(1);
        let xs = sample_positions(self.resolution_x, stride);
        let zs = sample_positions(self.resolution_z, stride);
        let scale_x = self.size.x / (self.resolution_x - 1) as f32;
        let scale_z = self.size.z / (self.resolution_z - 1) as f32;

        let mut vertices = Vec::with_capacity(xs.len() * zs.len());
        for &z in &zs {
            for &x in &xs {
                vertices.push(
                    self.position
                        + Vec3A::new(
                            x as f32 * scale_x,
                            self.sample(x, z) * self.size.y,
                            z as f32 * scale_z,
                        ),
                );
            }
        }

        let columns = xs.len() as u32;
        let mut indices = Vec::with_capacity((xs.len() - 1) * (zs.len() - 1) * 2);
        for j in 0..zs.len() as u32 - 1 {
            for i in 0..columns - 1 {
                let a = j * columns + i;
                let b = (j + 1) * columns + i;
                let c = (j + 1) * columns + i + 1;
                let d = j * columns + i + 1;
                indices.push(UVec3::new(a, b, c));
                indices.push(UVec3::new(a, c, d));
            }
        }

        TriMesh {
            vertices,
            area_types: vec![AreaType::NOT_WALKABLE; indices.len()],
            indices,
        }
    }
}

fn sample_positions(resolution: u32, stride: u32) -> Vec<u32> {
    let mut positions: Vec<u32> = (0..resolution).step_by(stride as usize).collect();
    if positions.last() != Some(&(resolution - 1)) {
        positions.push(resolution - 1);
    }
    positions
}
