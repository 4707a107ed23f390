use std::collections::HashMap;

use glam::{IVec3, U16Vec3, UVec3, Vec3A};

use crate::{
    Aabb3d, AreaType, RegionId,
    contours::{ContourSet, ContourVertex, geometry},
};

/// The triangulated contours: a shared vertex buffer and one triangle per node of the future navmesh graph.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonNavmesh {
    /// The mesh vertices in grid space: `x` and `z` in cells, `y` in cell heights.
    pub vertices: Vec<U16Vec3>,
    /// Indices into [`Self::vertices`], three per triangle.
    pub triangles: Vec<UVec3>,
    /// The area id assigned to each triangle.
    pub areas: Vec<AreaType>,
    /// The region id assigned to each triangle.
    pub regions: Vec<RegionId>,
    /// The bounding box of the mesh in world space.
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The max error of the polygon edges in the mesh.
    pub max_edge_error: f32,
}

impl PolygonNavmesh {
    /// The world space position of a vertex.
    #[inline]
    pub fn world_vertex(&self, index: usize) -> Vec3A {
        let v = self.vertices[index].as_vec3a();
        self.aabb.min + Vec3A::new(v.x * self.cell_size, v.y * self.cell_height, v.z * self.cell_size)
    }

    /// All vertices in world space.
    pub fn world_vertices(&self) -> Vec<Vec3A> {
        (0..self.vertices.len()).map(|i| self.world_vertex(i)).collect()
    }

    /// Whether the mesh has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

impl ContourSet {
    /// Triangulates every contour with ear clipping and merges the vertices of all contours into one buffer.
    ///
    /// Vertices with equal `x` and `z` whose heights differ by at most two cells are shared.
    /// Contours that cannot be fully triangulated keep the triangles found so far and log a warning.
    pub fn into_polygon_mesh(self) -> PolygonNavmesh {
        let mut mesh = PolygonNavmesh {
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            max_edge_error: self.max_error,
            ..Default::default()
        };
        let mut buckets: HashMap<(u16, u16), Vec<u32>> = HashMap::new();
        let mut triangles = Vec::new();

        for contour in &self.contours {
            if contour.vertices.len() < 3 {
                continue;
            }
            triangles.clear();
            if let Err(missing) = triangulate(&contour.vertices, &mut triangles) {
                tracing::warn!(
                    region = contour.region.0,
                    missing,
                    "Bad triangulation of contour"
                );
            }

            let indices: Vec<u32> = contour
                .vertices
                .iter()
                .map(|vertex| add_vertex(vertex, &mut mesh.vertices, &mut buckets))
                .collect();

            for triangle in &triangles {
                let [a, b, c] = triangle.map(|i| indices[i]);
                // Vertex welding can collapse very thin triangles.
                if a == b || a == c || b == c {
                    continue;
                }
                mesh.triangles.push(UVec3::new(a, b, c));
                mesh.areas.push(contour.area);
                mesh.regions.push(contour.region);
            }
        }
        tracing::debug!(
            vertices = mesh.vertices.len(),
            triangles = mesh.triangles.len(),
            "Built polygon mesh"
        );
        mesh
    }
}

fn add_vertex(
    vertex: &ContourVertex,
    vertices: &mut Vec<U16Vec3>,
    buckets: &mut HashMap<(u16, u16), Vec<u32>>,
) -> u32 {
    let p = vertex.position;
    let (x, y, z) = (p.x as u16, p.y as u16, p.z as u16);
    let bucket = buckets.entry((x, z)).or_default();
    if let Some(&existing) = bucket
        .iter()
        .find(|&&i| (vertices[i as usize].y as i32 - y as i32).abs() <= 2)
    {
        return existing;
    }
    let index = vertices.len() as u32;
    vertices.push(U16Vec3::new(x, y, z));
    bucket.push(index);
    index
}

/// Ear clipping over the polygon `vertices`, pushing triangles as indices into it.
///
/// Among all ears, the one with the shortest new diagonal is cut first.
/// On failure, returns the number of vertices that could not be triangulated.
pub(crate) fn triangulate(vertices: &[ContourVertex], triangles: &mut Vec<[usize; 3]>) -> Result<(), usize> {
    let positions: Vec<IVec3> = vertices.iter().map(|vertex| vertex.position).collect();
    // (vertex index, whether the vertex is the tip of an ear)
    let mut polygon: Vec<(usize, bool)> = (0..positions.len()).map(|i| (i, false)).collect();
    let mut n = polygon.len();
    for i in 0..n {
        let i1 = next(i, n);
        let i2 = next(i1, n);
        if diagonal(i, i2, &polygon, &positions) {
            polygon[i1].1 = true;
        }
    }

    let position = |polygon: &[(usize, bool)], i: usize| positions[polygon[i].0];
    while n > 3 {
        let mut best: Option<(i64, usize)> = None;
        for i in 0..n {
            let i1 = next(i, n);
            if polygon[i1].1 {
                let length = diagonal_length(position(&polygon, i), position(&polygon, next(i1, n)));
                if best.is_none_or(|(best_length, _)| length < best_length) {
                    best = Some((length, i));
                }
            }
        }

        if best.is_none() {
            // We might get here because the contour has overlapping segments,
            // for instance where a merged hole touches its outline.
            // Try to recover by loosening up the inCone test a bit so that such diagonals are accepted as valid.
            for i in 0..n {
                let i1 = next(i, n);
                let i2 = next(i1, n);
                if diagonal_loose(i, i2, &polygon, &positions) {
                    let length = diagonal_length(position(&polygon, i), position(&polygon, i2));
                    if best.is_none_or(|(best_length, _)| length < best_length) {
                        best = Some((length, i));
                    }
                }
            }
        }
        let Some((_, i)) = best else {
            // The contour is messed up. This sometimes happens
            // if the contour simplification is too aggressive.
            return Err(n);
        };

        let mut i1 = next(i, n);
        let i2 = next(i1, n);
        triangles.push([polygon[i].0, polygon[i1].0, polygon[i2].0]);

        // Removes P[i1] by copying P[i+1]...P[n-1] left one index.
        polygon.remove(i1);
        n -= 1;
        if i1 >= n {
            i1 = 0;
        }
        let i = prev(i1, n);
        // Update diagonal flags.
        let i_is_ear = diagonal(prev(i, n), i1, &polygon, &positions);
        let i1_is_ear = diagonal(i, next(i1, n), &polygon, &positions);
        polygon[i].1 = i_is_ear;
        polygon[i1].1 = i1_is_ear;
    }

    // Append the remaining triangle.
    if n == 3 {
        triangles.push([polygon[0].0, polygon[1].0, polygon[2].0]);
    }
    Ok(())
}

#[inline]
fn next(i: usize, n: usize) -> usize {
    if i + 1 < n { i + 1 } else { 0 }
}

#[inline]
fn prev(i: usize, n: usize) -> usize {
    if i >= 1 { i - 1 } else { n - 1 }
}

#[inline]
fn diagonal_length(a: IVec3, b: IVec3) -> i64 {
    let dx = (b.x - a.x) as i64;
    let dz = (b.z - a.z) as i64;
    dx * dx + dz * dz
}

/// Returns true iff (v_i, v_j) is a proper internal diagonal of P.
fn diagonal(i: usize, j: usize, polygon: &[(usize, bool)], positions: &[IVec3]) -> bool {
    in_cone(i, j, polygon, positions, false) && diagonalie(i, j, polygon, positions, false)
}

/// Like [`diagonal`], but accepts diagonals touching collinear boundary edges.
fn diagonal_loose(i: usize, j: usize, polygon: &[(usize, bool)], positions: &[IVec3]) -> bool {
    in_cone(i, j, polygon, positions, true) && diagonalie(i, j, polygon, positions, true)
}

/// Returns true iff the diagonal (i,j) is strictly internal to the polygon in the neighborhood of the i endpoint.
fn in_cone(i: usize, j: usize, polygon: &[(usize, bool)], positions: &[IVec3], loose: bool) -> bool {
    let n = polygon.len();
    let pi = positions[polygon[i].0];
    let pj = positions[polygon[j].0];
    let pi1 = positions[polygon[next(i, n)].0];
    let pin1 = positions[polygon[prev(i, n)].0];

    // If P[i] is a convex vertex [ i+1 left or on (i-1,i) ].
    if geometry::left_on(pin1, pi, pi1) {
        return if loose {
            geometry::left_on(pi, pj, pin1) && geometry::left_on(pj, pi, pi1)
        } else {
            geometry::left(pi, pj, pin1) && geometry::left(pj, pi, pi1)
        };
    }
    // Assume (i-1,i,i+1) not collinear.
    // else P[i] is reflex.
    !(geometry::left_on(pi, pj, pi1) && geometry::left_on(pj, pi, pin1))
}

/// Returns true iff (v_i, v_j) is a proper internal *or* external diagonal of P,
/// ignoring edges incident to v_i and v_j.
fn diagonalie(i: usize, j: usize, polygon: &[(usize, bool)], positions: &[IVec3], loose: bool) -> bool {
    let n = polygon.len();
    let d0 = positions[polygon[i].0];
    let d1 = positions[polygon[j].0];

    // For each edge (k,k+1) of P
    for k in 0..n {
        let k1 = next(k, n);
        // Skip edges incident to i or j
        if k == i || k1 == i || k == j || k1 == j {
            continue;
        }
        let p0 = positions[polygon[k].0];
        let p1 = positions[polygon[k1].0];

        if geometry::xz_equal(d0, p0)
            || geometry::xz_equal(d1, p0)
            || geometry::xz_equal(d0, p1)
            || geometry::xz_equal(d1, p1)
        {
            continue;
        }
        let intersects = if loose {
            geometry::intersect_prop(d0, d1, p0, p1)
        } else {
            geometry::intersect(d0, d1, p0, p1)
        };
        if intersects {
            return false;
        }
    }
    true
}
