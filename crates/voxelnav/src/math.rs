//! Small geometry helpers shared by the build pipeline and the navmesh graph.

use glam::{UVec3, Vec3A};

/// An axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner.
    pub min: Vec3A,
    /// The maximum corner.
    pub max: Vec3A,
}

impl Aabb3d {
    /// Creates a new AABB from a center and its half extents.
    #[inline]
    pub fn new(center: impl Into<Vec3A>, half_size: impl Into<Vec3A>) -> Self {
        let center = center.into();
        let half_size = half_size.into();
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// Creates a new AABB from a center and its full size, the way bounding volumes are usually authored.
    #[inline]
    pub fn from_center_size(center: impl Into<Vec3A>, size: impl Into<Vec3A>) -> Self {
        Self::new(center, size.into() * 0.5)
    }

    /// Computes the AABB of a set of points. `None` if the set is empty.
    pub fn from_verts(verts: &[Vec3A]) -> Option<Self> {
        let (first, rest) = verts.split_first()?;
        let mut aabb = Self {
            min: *first,
            max: *first,
        };
        for vert in rest {
            aabb.expand_to_include(*vert);
        }
        Some(aabb)
    }

    /// The center of the box.
    #[inline]
    pub fn center(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    /// The full size of the box.
    #[inline]
    pub fn size(&self) -> Vec3A {
        self.max - self.min
    }

    /// Grows the box so that it contains `point`.
    #[inline]
    pub fn expand_to_include(&mut self, point: Vec3A) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// The smallest box containing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether the two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Whether the two boxes overlap on the xz-plane.
    #[inline]
    pub fn intersects_xz(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Whether `point` lies inside the box, on the xz-plane only.
    #[inline]
    pub fn contains_xz(&self, point: Vec3A) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Squared distance from `point` to the closest point of the box. Zero if inside.
    #[inline]
    pub fn distance_squared_to_point(&self, point: Vec3A) -> f32 {
        let closest = point.clamp(self.min, self.max);
        closest.distance_squared(point)
    }

    /// Half of the surface area, used as the insertion cost of bounding volume trees.
    #[inline]
    pub fn half_area(&self) -> f32 {
        let size = self.size().max(Vec3A::ZERO);
        size.x * size.y + size.y * size.z + size.z * size.x
    }
}

pub(crate) trait TriangleIndices {
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A;
}

impl TriangleIndices for UVec3 {
    #[inline]
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A {
        let a = vertices[self[0] as usize];
        let b = vertices[self[1] as usize];
        let c = vertices[self[2] as usize];
        let ab = b - a;
        let ac = c - a;
        ab.cross(ac).normalize_or_zero()
    }
}

pub(crate) trait TriangleVertices {
    fn aabb(&self) -> Aabb3d;
}

impl TriangleVertices for [Vec3A; 3] {
    #[inline]
    fn aabb(&self) -> Aabb3d {
        let min = self[0].min(self[1]).min(self[2]);
        let max = self[0].max(self[1]).max(self[2]);
        Aabb3d { min, max }
    }
}

/// Gets the standard width (x-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The width offset to apply to the current cell position to move in the direction.
#[inline]
pub(crate) fn dir_offset_x(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [-1, 0, 1, 0];
    OFFSET[direction as usize & 0x03]
}

/// Gets the standard height (z-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The height offset to apply to the current cell position to move in the direction.
#[inline]
pub(crate) fn dir_offset_z(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [0, 1, 0, -1];
    OFFSET[direction as usize & 0x03]
}

/// Twice the signed area of the triangle on the xz-plane.
#[inline]
pub(crate) fn triangle_area2_xz(a: Vec3A, b: Vec3A, c: Vec3A) -> f32 {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)
}

/// Whether `p` lies inside or on the border of the triangle, projected onto the xz-plane.
/// Works for either winding.
pub(crate) fn point_in_triangle_xz(p: Vec3A, a: Vec3A, b: Vec3A, c: Vec3A) -> bool {
    const EPSILON: f32 = 1e-6;
    let d1 = triangle_area2_xz(p, a, b);
    let d2 = triangle_area2_xz(p, b, c);
    let d3 = triangle_area2_xz(p, c, a);
    let has_neg = d1 < -EPSILON || d2 < -EPSILON || d3 < -EPSILON;
    let has_pos = d1 > EPSILON || d2 > EPSILON || d3 > EPSILON;
    !(has_neg && has_pos)
}

/// Height of the triangle's plane at the xz-position of `p`.
/// `None` for triangles that are degenerate on the xz-plane.
pub(crate) fn triangle_height_at(p: Vec3A, a: Vec3A, b: Vec3A, c: Vec3A) -> Option<f32> {
    let denom = triangle_area2_xz(a, b, c);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let u = triangle_area2_xz(p, b, c) / denom;
    let v = triangle_area2_xz(a, p, c) / denom;
    let w = 1.0 - u - v;
    Some(a.y * u + b.y * v + c.y * w)
}

/// Closest point to `p` on the solid triangle `abc`.
pub(crate) fn closest_point_on_triangle(p: Vec3A, a: Vec3A, b: Vec3A, c: Vec3A) -> Vec3A {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() < f32::EPSILON {
        // Degenerate triangle, fall back to the closest vertex.
        return [a, b, c]
            .into_iter()
            .min_by(|l, r| l.distance_squared(p).total_cmp(&r.distance_squared(p)))
            .unwrap_or(a);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Intersects the segments `p0 -> p1` and `q0 -> q1` on the xz-plane.
///
/// Returns the parameters `(s, t)` such that the intersection is at `p0 + (p1 - p0) * s`
/// and `q0 + (q1 - q0) * t`, or `None` if the segments are parallel or don't cross.
pub(crate) fn segment_intersection_xz(
    p0: Vec3A,
    p1: Vec3A,
    q0: Vec3A,
    q1: Vec3A,
) -> Option<(f32, f32)> {
    const EPSILON: f32 = 1e-6;
    let d_p = p1 - p0;
    let d_q = q1 - q0;
    let denom = d_p.x * d_q.z - d_p.z * d_q.x;
    if denom.abs() < EPSILON {
        return None;
    }
    let diff = q0 - p0;
    let s = (diff.x * d_q.z - diff.z * d_q.x) / denom;
    let t = (diff.x * d_p.z - diff.z * d_p.x) / denom;
    if !(-EPSILON..=1.0 + EPSILON).contains(&s) || !(-EPSILON..=1.0 + EPSILON).contains(&t) {
        return None;
    }
    Some((s.clamp(0.0, 1.0), t.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn aabb_from_center_size() {
        let aabb = Aabb3d::from_center_size([5.0, 0.0, 5.0], [10.0, 2.0, 10.0]);
        assert_eq!(aabb.min, Vec3A::new(0.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3A::new(10.0, 1.0, 10.0));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb3d::new(Vec3A::ZERO, Vec3A::ONE);
        let b = Aabb3d::new(Vec3A::new(2.0, 0.0, 0.0), Vec3A::ONE);
        let c = Aabb3d::new(Vec3A::new(2.1, 0.0, 0.0), Vec3A::ONE);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn point_in_triangle_ignores_winding() {
        let a = Vec3A::new(0.0, 0.0, 0.0);
        let b = Vec3A::new(0.0, 0.0, 1.0);
        let c = Vec3A::new(1.0, 0.0, 0.0);
        let p = Vec3A::new(0.25, 3.0, 0.25);
        assert!(point_in_triangle_xz(p, a, b, c));
        assert!(point_in_triangle_xz(p, a, c, b));
        assert!(!point_in_triangle_xz(Vec3A::new(0.8, 0.0, 0.8), a, b, c));
    }

    #[test]
    fn closest_point_projects_onto_face() {
        let a = Vec3A::new(0.0, 0.0, 0.0);
        let b = Vec3A::new(0.0, 0.0, 2.0);
        let c = Vec3A::new(2.0, 0.0, 0.0);
        let closest = closest_point_on_triangle(Vec3A::new(0.5, 3.0, 0.5), a, b, c);
        assert_relative_eq!(closest.x, 0.5);
        assert_relative_eq!(closest.y, 0.0);
        assert_relative_eq!(closest.z, 0.5);

        let closest = closest_point_on_triangle(Vec3A::new(-1.0, 0.0, -1.0), a, b, c);
        assert_eq!(closest, a);
    }

    #[test]
    fn height_is_interpolated() {
        let a = Vec3A::new(0.0, 0.0, 0.0);
        let b = Vec3A::new(0.0, 2.0, 2.0);
        let c = Vec3A::new(2.0, 0.0, 0.0);
        let height = triangle_height_at(Vec3A::new(0.5, 0.0, 1.0), a, b, c).unwrap();
        assert_relative_eq!(height, 1.0);
    }

    #[test]
    fn crossing_segments_intersect() {
        let (s, t) = segment_intersection_xz(
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(2.0, 0.0, 0.0),
            Vec3A::new(1.0, 0.0, -1.0),
            Vec3A::new(1.0, 0.0, 1.0),
        )
        .unwrap();
        assert_relative_eq!(s, 0.5);
        assert_relative_eq!(t, 0.5);

        assert!(
            segment_intersection_xz(
                Vec3A::new(0.0, 0.0, 0.0),
                Vec3A::new(2.0, 0.0, 0.0),
                Vec3A::new(3.0, 0.0, -1.0),
                Vec3A::new(3.0, 0.0, 1.0),
            )
            .is_none()
        );
    }
}
