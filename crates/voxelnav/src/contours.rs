use glam::IVec3;

use crate::{Aabb3d, AreaType, CompactHeightfield, RegionId};

impl CompactHeightfield {
    /// The raw contours will match the region outlines exactly. The `max_error` and `max_edge_len`
    /// parameters control how closely the simplified contours will match the raw contours.
    ///
    /// Simplified contours are generated such that the vertices for portals between areas match up.
    /// (They are considered mandatory vertices.)
    ///
    /// Setting `max_edge_len` to zero will disable the edge length feature.
    ///
    /// Holes of a region are merged into its outline, so every region ends up with at most one contour.
    pub fn build_contours(
        &self,
        max_error: f32,
        max_edge_len: u16,
        build_flags: BuildContoursFlags,
    ) -> ContourSet {
        let mut cset = ContourSet {
            contours: Vec::with_capacity(self.max_region.0.max(8) as usize),
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            width: self.width,
            height: self.height,
            max_error,
        };

        let mut flags = vec![0_u8; self.spans.len()];

        // Mark boundaries
        self.for_each_span(|x, z, i| {
            let region = self.spans[i].region;
            if !region.is_some() {
                flags[i] = 0;
                return;
            }
            let mut res = 0;
            for dir in 0..4 {
                let neighbor_region = self
                    .neighbor(x, z, i, dir)
                    .map(|(_, _, neighbor)| self.spans[neighbor].region)
                    .unwrap_or(RegionId::NONE);
                if neighbor_region == region {
                    res |= 1 << dir;
                }
            }
            // Inverse, mark non connected edges.
            flags[i] = res ^ 0xf;
        });

        let mut verts = Vec::with_capacity(256);
        let mut simplified = Vec::with_capacity(64);

        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).span_range() {
                    if flags[i] == 0 || flags[i] == 0xf {
                        flags[i] = 0;
                        continue;
                    }
                    let region = self.spans[i].region;
                    if !region.is_some() {
                        continue;
                    }
                    let area = self.areas[i];

                    verts.clear();
                    simplified.clear();

                    self.walk_contour(x, z, i, &mut flags, &mut verts);
                    simplify_contour(&verts, &mut simplified, max_error, max_edge_len, build_flags);
                    remove_degenerate_segments(&mut simplified);

                    if simplified.len() >= 3 {
                        cset.contours.push(Contour {
                            vertices: simplified.clone(),
                            raw_vertices: verts.clone(),
                            region,
                            area,
                        });
                    }
                }
            }
        }

        cset.merge_holes(self.max_region);
        tracing::debug!(contours = cset.contours.len(), "Built contours");
        cset
    }

    fn walk_contour(
        &self,
        mut x: u16,
        mut z: u16,
        mut i: usize,
        flags: &mut [u8],
        points: &mut Vec<ContourVertex>,
    ) {
        // Choose the first non-connected edge
        let mut dir = 0_u8;
        while flags[i] & (1 << dir) == 0 {
            dir += 1;
        }

        let start_dir = dir;
        let start_i = i;
        let area = self.areas[i];

        for _ in 0..40_000 {
            if flags[i] & (1 << dir) != 0 {
                // Choose the edge corner
                let p_y = self.corner_height(x, z, i, dir);
                let (p_x, p_z) = match dir {
                    0 => (x, z + 1),
                    1 => (x + 1, z + 1),
                    2 => (x + 1, z),
                    _ => (x, z),
                };
                let mut neighbor = RegionVertexId::NONE;
                if let Some((_, _, a_i)) = self.neighbor(x, z, i, dir) {
                    neighbor = RegionVertexId::from(self.spans[a_i].region);
                    if area != self.areas[a_i] {
                        neighbor |= RegionVertexId::AREA_BORDER;
                    }
                }
                points.push(ContourVertex {
                    position: IVec3::new(p_x as i32, p_y as i32, p_z as i32),
                    neighbor,
                });

                flags[i] &= !(1 << dir);
                // Rotate clockwise
                dir = (dir + 1) & 0x3;
            } else {
                let Some((n_x, n_z, n_i)) = self.neighbor(x, z, i, dir) else {
                    // A connected edge always has a neighbor.
                    tracing::warn!(x, z, "Contour walk left the walkable area");
                    return;
                };
                x = n_x;
                z = n_z;
                i = n_i;
                // Rotate counterclockwise
                dir = (dir + 3) & 0x3;
            }
            if start_i == i && start_dir == dir {
                break;
            }
        }
    }

    /// The height of the corner clockwise of edge `dir` of span `i`: the highest floor of the up to four spans sharing it.
    fn corner_height(&self, x: u16, z: u16, i: usize, dir: u8) -> u16 {
        let mut height = self.spans[i].y;
        let dir_p = (dir + 1) & 0x3;

        if let Some((a_x, a_z, a_i)) = self.neighbor(x, z, i, dir) {
            height = height.max(self.spans[a_i].y);
            if let Some((_, _, b_i)) = self.neighbor(a_x, a_z, a_i, dir_p) {
                height = height.max(self.spans[b_i].y);
            }
        }
        if let Some((a_x, a_z, a_i)) = self.neighbor(x, z, i, dir_p) {
            height = height.max(self.spans[a_i].y);
            if let Some((_, _, b_i)) = self.neighbor(a_x, a_z, a_i, dir) {
                height = height.max(self.spans[b_i].y);
            }
        }
        height
    }
}

/// A simplified vertex, remembering which raw vertex it came from.
#[derive(Debug, Clone, Copy)]
struct Mandatory {
    position: IVec3,
    raw_index: usize,
}

fn simplify_contour(
    points: &[ContourVertex],
    simplified: &mut Vec<ContourVertex>,
    max_error: f32,
    max_edge_len: u16,
    flags: BuildContoursFlags,
) {
    let mut kept: Vec<Mandatory> = Vec::with_capacity(simplified.capacity());
    let point_count = points.len();

    // Add initial points.
    let has_connections = points.iter().any(|p| p.neighbor.region().is_some());
    if has_connections {
        // The contour has some portals to other regions.
        // Add a new point to every location where the region changes.
        for (i, point) in points.iter().enumerate() {
            let next = &points[(i + 1) % point_count];
            let different_regs = point.neighbor.region() != next.neighbor.region();
            let area_borders = point.neighbor.contains(RegionVertexId::AREA_BORDER)
                != next.neighbor.contains(RegionVertexId::AREA_BORDER);
            if different_regs || area_borders {
                kept.push(Mandatory {
                    position: point.position,
                    raw_index: i,
                });
            }
        }
    }

    if kept.is_empty() {
        // If there is no connections at all,
        // create some initial points for the simplification process.
        // Find lower-left and upper-right vertices of the contour.
        let mut lower_left = 0;
        let mut upper_right = 0;
        for (i, point) in points.iter().enumerate() {
            let p = point.position;
            let ll = points[lower_left].position;
            let ur = points[upper_right].position;
            if p.x < ll.x || (p.x == ll.x && p.z < ll.z) {
                lower_left = i;
            }
            if p.x > ur.x || (p.x == ur.x && p.z > ur.z) {
                upper_right = i;
            }
        }
        kept.push(Mandatory {
            position: points[lower_left].position,
            raw_index: lower_left,
        });
        kept.push(Mandatory {
            position: points[upper_right].position,
            raw_index: upper_right,
        });
    }

    // Add points until all raw points are within
    // error tolerance to the simplified shape.
    let mut i = 0;
    while i < kept.len() {
        let next = (i + 1) % kept.len();
        let mut a = kept[i].position;
        let a_i = kept[i].raw_index;
        let mut b = kept[next].position;
        let b_i = kept[next].raw_index;

        // Traverse the segment in lexicographic order so that the
        // max deviation is calculated similarly when traversing
        // opposite segments.
        let (mut c_i, c_inc, end_i) = if b.x > a.x || (b.x == a.x && b.z > a.z) {
            ((a_i + 1) % point_count, 1, b_i)
        } else {
            std::mem::swap(&mut a, &mut b);
            ((b_i + point_count - 1) % point_count, point_count - 1, a_i)
        };

        let mut max_d = 0.0;
        let mut max_i = None;
        // Tessellate only outer edges or edges between areas.
        let neighbor = points[c_i].neighbor;
        if !neighbor.region().is_some() || neighbor.contains(RegionVertexId::AREA_BORDER) {
            while c_i != end_i {
                let d = distance_squared_point_segment(points[c_i].position, a, b);
                if d > max_d {
                    max_d = d;
                    max_i = Some(c_i);
                }
                c_i = (c_i + c_inc) % point_count;
            }
        }

        // If the max deviation is larger than accepted error,
        // add new point, else continue to next segment.
        match max_i {
            Some(max_i) if max_d > max_error * max_error => {
                kept.insert(
                    i + 1,
                    Mandatory {
                        position: points[max_i].position,
                        raw_index: max_i,
                    },
                );
            }
            _ => i += 1,
        }
    }

    // Split too long edges.
    let tessellate_walls = flags.contains(BuildContoursFlags::TESSELLATE_SOLID_WALL_EDGES);
    let tessellate_areas = flags.contains(BuildContoursFlags::TESSELLATE_AREA_EDGES);
    if max_edge_len > 0 && (tessellate_walls || tessellate_areas) {
        let max_edge_len = max_edge_len as i32;
        let mut i = 0;
        while i < kept.len() {
            let next = (i + 1) % kept.len();
            let a = kept[i].position;
            let a_i = kept[i].raw_index;
            let b = kept[next].position;
            let b_i = kept[next].raw_index;

            // Find maximum deviation from the segment.
            let mut max_i = None;
            let c_i = (a_i + 1) % point_count;

            // Tessellate only outer edges or edges between areas.
            let neighbor = points[c_i].neighbor;
            let tessellate = (tessellate_walls && !neighbor.region().is_some())
                || (tessellate_areas && neighbor.contains(RegionVertexId::AREA_BORDER));

            if tessellate {
                let dx = b.x - a.x;
                let dz = b.z - a.z;
                if dx * dx + dz * dz > max_edge_len * max_edge_len {
                    // Round based on the segments in lexicographic order so that the
                    // max tesselation is consistent regardless in which direction
                    // segments are traversed.
                    let n = if b_i < a_i {
                        b_i + point_count - a_i
                    } else {
                        b_i - a_i
                    };
                    if n > 1 {
                        max_i = Some(if b.x > a.x || (b.x == a.x && b.z > a.z) {
                            (a_i + n / 2) % point_count
                        } else {
                            (a_i + (n + 1) / 2) % point_count
                        });
                    }
                }
            }

            // If the max deviation is larger than accepted error,
            // add new point, else continue to next segment.
            match max_i {
                Some(max_i) => kept.insert(
                    i + 1,
                    Mandatory {
                        position: points[max_i].position,
                        raw_index: max_i,
                    },
                ),
                None => i += 1,
            }
        }
    }

    // The neighbour region is taken from the next raw point.
    simplified.extend(kept.iter().map(|vertex| {
        let next = (vertex.raw_index + 1) % point_count;
        ContourVertex {
            position: vertex.position,
            neighbor: points[next].neighbor
                & (RegionVertexId::REGION_MASK | RegionVertexId::AREA_BORDER),
        }
    }));
}

fn remove_degenerate_segments(simplified: &mut Vec<ContourVertex>) {
    // Remove adjacent vertices which are equal on xz-plane,
    // or else the triangulator will get confused.
    let mut i = 0;
    while i < simplified.len() && simplified.len() > 1 {
        let next = (i + 1) % simplified.len();
        if simplified[i].position.x == simplified[next].position.x
            && simplified[i].position.z == simplified[next].position.z
        {
            // Degenerate segment, remove.
            simplified.remove(i);
        } else {
            i += 1;
        }
    }
}

fn distance_squared_point_segment(p: IVec3, a: IVec3, b: IVec3) -> f32 {
    let pq_x = (b.x - a.x) as f32;
    let pq_z = (b.z - a.z) as f32;
    let mut dx = (p.x - a.x) as f32;
    let mut dz = (p.z - a.z) as f32;
    let d = pq_x * pq_x + pq_z * pq_z;
    let mut t = pq_x * dx + pq_z * dz;
    if d > 0.0 {
        t /= d;
    }
    t = t.clamp(0.0, 1.0);
    dx = a.x as f32 + t * pq_x - p.x as f32;
    dz = a.z as f32 + t * pq_z - p.z as f32;
    dx * dx + dz * dz
}

/// Twice the signed area of a contour on the xz-plane. Outlines are positive, holes negative.
pub(crate) fn contour_area2(vertices: &[ContourVertex]) -> i64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let a = vertices[i].position;
            let b = vertices[(i + n - 1) % n].position;
            a.x as i64 * b.z as i64 - b.x as i64 * a.z as i64
        })
        .sum()
}

impl ContourSet {
    /// Merges every hole contour into the outline of its region.
    fn merge_holes(&mut self, max_region: RegionId) {
        let windings: Vec<bool> = self
            .contours
            .iter()
            .map(|contour| contour_area2(&contour.vertices) >= 0)
            .collect();
        if windings.iter().all(|&outline| outline) {
            return;
        }

        let mut outlines: Vec<Option<usize>> = vec![None; max_region.0 as usize + 1];
        let mut holes: Vec<Vec<usize>> = vec![Vec::new(); max_region.0 as usize + 1];
        for (index, (contour, &is_outline)) in self.contours.iter().zip(&windings).enumerate() {
            let region = contour.region.0 as usize;
            if is_outline {
                if outlines[region].is_some() {
                    tracing::warn!(region, "Multiple outlines for region");
                }
                outlines[region] = Some(index);
            } else {
                holes[region].push(index);
            }
        }

        for (region, hole_indices) in holes.iter().enumerate() {
            if hole_indices.is_empty() {
                continue;
            }
            let Some(outline) = outlines[region] else {
                tracing::warn!(region, "Missing outline for region with holes");
                continue;
            };
            let hole_vertices: Vec<Vec<ContourVertex>> = hole_indices
                .iter()
                .map(|&hole| std::mem::take(&mut self.contours[hole].vertices))
                .collect();
            merge_region_holes(region, &mut self.contours[outline].vertices, hole_vertices);
        }
        self.contours.retain(|contour| !contour.vertices.is_empty());
    }
}

fn merge_region_holes(
    region: usize,
    outline: &mut Vec<ContourVertex>,
    holes: Vec<Vec<ContourVertex>>,
) {
    // Sort holes from left to right.
    let mut holes: Vec<(Vec<ContourVertex>, usize)> = holes
        .into_iter()
        .map(|hole| {
            let leftmost = leftmost_vertex(&hole);
            (hole, leftmost)
        })
        .collect();
    holes.sort_by_key(|(hole, leftmost)| (hole[*leftmost].position.x, hole[*leftmost].position.z));

    for i in 0..holes.len() {
        let (hole, leftmost) = &holes[i];
        let mut best_vertex = *leftmost;
        let mut index = None;
        for _ in 0..hole.len() {
            // Find potential diagonals.
            // The 'best' vertex must be in the cone described by 3 consecutive vertices of the outline.
            let corner = hole[best_vertex].position;
            let mut diagonals: Vec<(usize, i64)> = (0..outline.len())
                .filter(|&j| in_cone(j, outline, corner))
                .map(|j| {
                    let d = outline[j].position - corner;
                    (j, d.x as i64 * d.x as i64 + d.z as i64 * d.z as i64)
                })
                .collect();
            // Sort potential diagonals by distance, we want to make the connection as short as possible.
            diagonals.sort_by_key(|&(j, distance)| (distance, j));

            // Find a diagonal that is not intersecting the outline nor the remaining holes.
            index = diagonals.iter().map(|&(j, _)| j).find(|&j| {
                let pt = outline[j].position;
                !intersect_seg_contour(pt, corner, Some(j), outline)
                    && !holes[i..]
                        .iter()
                        .any(|(other, _)| intersect_seg_contour(pt, corner, None, other))
            });
            // If found non-intersecting diagonal, stop looking.
            if index.is_some() {
                break;
            }
            // All the potential diagonals for the current vertex were intersecting, try next vertex.
            best_vertex = (best_vertex + 1) % hole.len();
        }

        let Some(index) = index else {
            tracing::warn!(region, "Failed to find merge points for hole");
            continue;
        };
        // Walk the outline up to the diagonal, around the hole and back.
        let mut merged = Vec::with_capacity(outline.len() + hole.len() + 2);
        merged.extend((0..=outline.len()).map(|k| outline[(index + k) % outline.len()]));
        merged.extend((0..=hole.len()).map(|k| hole[(best_vertex + k) % hole.len()]));
        *outline = merged;
    }
}

fn leftmost_vertex(vertices: &[ContourVertex]) -> usize {
    let mut leftmost = 0;
    for (i, vertex) in vertices.iter().enumerate() {
        let p = vertex.position;
        let l = vertices[leftmost].position;
        if p.x < l.x || (p.x == l.x && p.z < l.z) {
            leftmost = i;
        }
    }
    leftmost
}

fn in_cone(i: usize, vertices: &[ContourVertex], pj: IVec3) -> bool {
    let n = vertices.len();
    let pi = vertices[i].position;
    let pi1 = vertices[(i + 1) % n].position;
    let pin1 = vertices[(i + n - 1) % n].position;

    // If P[i] is a convex vertex [ i+1 left or on (i-1,i) ].
    if geometry::left_on(pin1, pi, pi1) {
        return geometry::left(pi, pj, pin1) && geometry::left(pj, pi, pi1);
    }
    // Assume (i-1,i,i+1) not collinear.
    // else P[i] is reflex.
    !(geometry::left_on(pi, pj, pi1) && geometry::left_on(pj, pi, pin1))
}

fn intersect_seg_contour(d0: IVec3, d1: IVec3, skip: Option<usize>, vertices: &[ContourVertex]) -> bool {
    let n = vertices.len();
    // For each edge (k,k+1) of P
    for k in 0..n {
        let k1 = (k + 1) % n;
        // Skip edges incident to i.
        if skip == Some(k) || skip == Some(k1) {
            continue;
        }
        let p0 = vertices[k].position;
        let p1 = vertices[k1].position;
        if geometry::xz_equal(d0, p0)
            || geometry::xz_equal(d1, p0)
            || geometry::xz_equal(d0, p1)
            || geometry::xz_equal(d1, p1)
        {
            continue;
        }
        if geometry::intersect(d0, d1, p0, p1) {
            return true;
        }
    }
    false
}

/// Integer predicates on the xz-plane, shared by the hole merger and the triangulator.
pub(crate) mod geometry {
    use glam::IVec3;

    #[inline]
    pub(crate) fn area2(a: IVec3, b: IVec3, c: IVec3) -> i64 {
        (b.x as i64 - a.x as i64) * (c.z as i64 - a.z as i64)
            - (c.x as i64 - a.x as i64) * (b.z as i64 - a.z as i64)
    }

    /// Exclusive or: true iff exactly one argument is true.
    #[inline]
    fn xorb(x: bool, y: bool) -> bool {
        x != y
    }

    /// Returns true iff c is strictly to the left of the directed line through a to b.
    #[inline]
    pub(crate) fn left(a: IVec3, b: IVec3, c: IVec3) -> bool {
        area2(a, b, c) < 0
    }

    #[inline]
    pub(crate) fn left_on(a: IVec3, b: IVec3, c: IVec3) -> bool {
        area2(a, b, c) <= 0
    }

    #[inline]
    pub(crate) fn collinear(a: IVec3, b: IVec3, c: IVec3) -> bool {
        area2(a, b, c) == 0
    }

    /// Returns true iff ab properly intersects cd: they share a point interior to both segments.
    /// The properness of the intersection is ensured by using strict leftness.
    pub(crate) fn intersect_prop(a: IVec3, b: IVec3, c: IVec3, d: IVec3) -> bool {
        // Eliminate improper cases.
        if collinear(a, b, c) || collinear(a, b, d) || collinear(c, d, a) || collinear(c, d, b) {
            return false;
        }
        xorb(left(a, b, c), left(a, b, d)) && xorb(left(c, d, a), left(c, d, b))
    }

    /// Returns true iff (a,b,c) are collinear and point c lies on the closed segment ab.
    pub(crate) fn between(a: IVec3, b: IVec3, c: IVec3) -> bool {
        if !collinear(a, b, c) {
            return false;
        }
        // If ab not vertical, check betweenness on x; else on z.
        if a.x != b.x {
            (a.x <= c.x && c.x <= b.x) || (a.x >= c.x && c.x >= b.x)
        } else {
            (a.z <= c.z && c.z <= b.z) || (a.z >= c.z && c.z >= b.z)
        }
    }

    /// Returns true iff segments ab and cd intersect, properly or improperly.
    pub(crate) fn intersect(a: IVec3, b: IVec3, c: IVec3, d: IVec3) -> bool {
        intersect_prop(a, b, c, d)
            || between(a, b, c)
            || between(a, b, d)
            || between(c, d, a)
            || between(c, d, b)
    }

    #[inline]
    pub(crate) fn xz_equal(a: IVec3, b: IVec3) -> bool {
        a.x == b.x && a.z == b.z
    }
}

/// Represents a group of related contours.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSet {
    /// An array of the contours in the set.
    pub contours: Vec<Contour>,
    /// The AABB in world space
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The width of the set. (Along the x-axis in cell units.)
    pub width: u16,
    /// The height of the set. (Along the z-axis in cell units.)
    pub height: u16,
    /// The max edge error that this contour set was simplified with.
    pub max_error: f32,
}

bitflags::bitflags! {
    /// The region on the other side of a contour edge, plus edge flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct RegionVertexId: u32 {
        /// No neighboring region: the edge is a wall.
        const NONE = 0;

        /// Applied to the region id field of contour vertices in order to extract the region id.
        /// The region id field of a vertex may have several flags applied to it.  So the
        /// fields value can't be used directly.
        const REGION_MASK = RegionId::MAX.0 as u32;

        /// Area border flag.
        /// If a region ID has this bit set, then the associated element lies on
        /// the border of an area.
        /// (Used during the region and contour build process.)
        const AREA_BORDER = 0x20_000;
    }
}

impl RegionVertexId {
    /// The neighboring region without any flags.
    #[inline]
    pub fn region(&self) -> RegionId {
        RegionId((self.bits() & Self::REGION_MASK.bits()) as u16)
    }
}

impl From<RegionId> for RegionVertexId {
    fn from(region_id: RegionId) -> Self {
        RegionVertexId::from_bits_retain(region_id.0 as u32)
    }
}

/// A vertex of a [`Contour`] in grid space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourVertex {
    /// `x` and `z` in cells, `y` in cell heights.
    pub position: IVec3,
    /// The region across the edge starting at this vertex.
    pub neighbor: RegionVertexId,
}

/// Represents a simple, non-overlapping contour in field space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    /// Simplified contour vertex and connection data.
    pub vertices: Vec<ContourVertex>,
    /// Raw contour vertex and connection data.
    pub raw_vertices: Vec<ContourVertex>,
    /// Region ID of the contour.
    pub region: RegionId,
    /// Area type of the contour.
    pub area: AreaType,
}

impl Contour {
    /// The regions this contour shares a portal with, in ascending order.
    pub fn neighbor_regions(&self) -> Vec<RegionId> {
        let mut regions: Vec<RegionId> = self
            .vertices
            .iter()
            .map(|vertex| vertex.neighbor.region())
            .filter(RegionId::is_some)
            .collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }
}

bitflags::bitflags! {
    /// Contour build flags used in [`CompactHeightfield::build_contours`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct BuildContoursFlags: u8 {
        /// Tessellate solid (impassable) edges during contour simplification.
        const TESSELLATE_SOLID_WALL_EDGES = 1;
        /// Tessellate edges between areas during contour simplification.
        const TESSELLATE_AREA_EDGES = 2;

        /// Default flags for building contours.
        const DEFAULT = Self::TESSELLATE_SOLID_WALL_EDGES.bits();
    }
}

impl Default for BuildContoursFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{HeightfieldBuilder, heightfield::SpanInsertion, span::SpanBuilder};

    use super::*;

    fn field(width: u16, height: u16, area_at: impl Fn(u16, u16) -> AreaType) -> CompactHeightfield {
        let mut heightfield = HeightfieldBuilder {
            aabb: Aabb3d {
                min: Vec3A::ZERO,
                max: Vec3A::new(width as f32, 10.0, height as f32),
            },
            cell_size: 1.0,
            cell_height: 1.0,
            max_columns: HeightfieldBuilder::DEFAULT_MAX_COLUMNS,
        }
        .build()
        .unwrap();
        for z in 0..height {
            for x in 0..width {
                heightfield
                    .add_span(SpanInsertion {
                        x,
                        z,
                        flag_merge_threshold: 0,
                        span: SpanBuilder {
                            min: 0,
                            max: 1,
                            area: area_at(x, z),
                            next: None,
                        }
                        .build(),
                    })
                    .unwrap();
            }
        }
        let mut compact = CompactHeightfield::from_heightfield(&heightfield, 2, 1).unwrap();
        compact.build_distance_field();
        compact.build_regions(4).unwrap();
        compact
    }

    fn xz(vertex: &ContourVertex) -> (i32, i32) {
        (vertex.position.x, vertex.position.z)
    }

    #[test]
    fn open_square_simplifies_to_its_corners() {
        let field = field(10, 10, |_, _| AreaType::DEFAULT_WALKABLE);
        let contours = field.build_contours(1.3, 0, BuildContoursFlags::DEFAULT);
        assert_eq!(contours.contours.len(), 1);
        let contour = &contours.contours[0];
        assert_eq!(contour.raw_vertices.len(), 40);
        let mut corners: Vec<_> = contour.vertices.iter().map(xz).collect();
        corners.sort();
        assert_eq!(corners, vec![(0, 0), (0, 10), (10, 0), (10, 10)]);
        assert!(contour_area2(&contour.vertices) > 0);
        assert!(contour.neighbor_regions().is_empty());
    }

    #[test]
    fn long_walls_are_split() {
        let field = field(10, 10, |_, _| AreaType::DEFAULT_WALKABLE);
        let contours = field.build_contours(1.3, 4, BuildContoursFlags::DEFAULT);
        let contour = &contours.contours[0];
        assert!(contour.vertices.len() > 4);
        let n = contour.vertices.len();
        for i in 0..n {
            let a = contour.vertices[i].position;
            let b = contour.vertices[(i + 1) % n].position;
            let d = b - a;
            assert!(d.x * d.x + d.z * d.z <= 16, "edge {a} -> {b}");
        }
    }

    #[test]
    fn neighboring_areas_share_portal_vertices() {
        let field = field(12, 6, |x, _| {
            if x < 6 {
                AreaType(1)
            } else {
                AreaType(2)
            }
        });
        let contours = field.build_contours(1.3, 0, BuildContoursFlags::DEFAULT);
        assert_eq!(contours.contours.len(), 2);
        let [left, right] = [&contours.contours[0], &contours.contours[1]];
        assert_eq!(left.neighbor_regions(), vec![right.region]);
        assert_eq!(right.neighbor_regions(), vec![left.region]);

        let portal = |contour: &Contour| {
            let mut portal: Vec<_> = contour
                .vertices
                .iter()
                .filter(|vertex| vertex.position.x == 6)
                .map(xz)
                .collect();
            portal.sort();
            portal
        };
        assert_eq!(portal(left), vec![(6, 0), (6, 6)]);
        assert_eq!(portal(left), portal(right));
    }

    #[test]
    fn hole_is_merged_into_the_outline() {
        let field = field(9, 9, |x, z| {
            if (3..6).contains(&x) && (3..6).contains(&z) {
                AreaType::NOT_WALKABLE
            } else {
                AreaType::DEFAULT_WALKABLE
            }
        });
        let contours = field.build_contours(1.3, 0, BuildContoursFlags::DEFAULT);
        // However the ring is partitioned, no contour is left with a negative winding.
        assert!(!contours.contours.is_empty());
        for contour in &contours.contours {
            assert!(contour_area2(&contour.vertices) >= 0);
        }
    }

    #[test]
    fn geometry_predicates() {
        use geometry::*;
        let a = IVec3::new(0, 0, 0);
        let b = IVec3::new(4, 0, 0);
        let c = IVec3::new(2, 0, 2);
        let d = IVec3::new(2, 0, -2);
        assert!(intersect_prop(a, b, c, d));
        assert!(between(a, b, IVec3::new(3, 0, 0)));
        assert!(!between(a, b, IVec3::new(5, 0, 0)));
        assert!(intersect(a, b, IVec3::new(4, 0, 0), IVec3::new(4, 0, 3)));
        assert!(!intersect(a, b, IVec3::new(0, 0, 1), IVec3::new(4, 0, 1)));
    }
}
