//! Conservative rasterization of triangles into a [`Heightfield`].

use glam::Vec3A;

use crate::{
    heightfield::{Heightfield, SpanInsertion, SpanInsertionError},
    math::TriangleVertices as _,
    span::{AreaType, Span, SpanBuilder},
    trimesh::TriMesh,
};

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Z,
}

impl Axis {
    #[inline]
    fn of(self, v: Vec3A) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Z => v.z,
        }
    }
}

/// How spans poking out of the vertical extent of the field are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalClipping {
    /// Spans entirely above or below the field are dropped.
    #[default]
    Discard,
    /// Spans entirely above or below the field are clamped onto its top or bottom.
    Clamp,
}

impl Heightfield {
    /// Rasterizes all triangles of `trimesh` using their [`TriMesh::area_types`].
    pub fn populate_from_trimesh(
        &mut self,
        trimesh: &TriMesh,
        flag_merge_threshold: u16,
        clipping: VerticalClipping,
    ) -> Result<(), SpanInsertionError> {
        for (i, area) in trimesh.area_types.iter().enumerate().take(trimesh.indices.len()) {
            self.rasterize_triangle(trimesh.triangle(i), *area, flag_merge_threshold, clipping)?;
        }
        Ok(())
    }

    /// Clips a triangle against every grid row and column it touches and adds a span for each covered cell.
    pub(crate) fn rasterize_triangle(
        &mut self,
        triangle: [Vec3A; 3],
        area: AreaType,
        flag_merge_threshold: u16,
        clipping: VerticalClipping,
    ) -> Result<(), SpanInsertionError> {
        let mut triangle_aabb = triangle.aabb();
        if clipping == VerticalClipping::Clamp {
            triangle_aabb.min.y = triangle_aabb.min.y.min(self.aabb.max.y);
            triangle_aabb.max.y = triangle_aabb.max.y.max(self.aabb.min.y);
        }
        // If the triangle does not touch the bounding box of the heightfield, skip the triangle.
        if !triangle_aabb.intersects(&self.aabb) {
            return Ok(());
        }

        let width = self.width as i32;
        let height = self.height as i32;
        let inverse_cell_size = 1.0 / self.cell_size;
        let inverse_cell_height = 1.0 / self.cell_height;
        let by = self.aabb.max.y - self.aabb.min.y;

        // Calculate the footprint of the triangle on the grid's z-axis.
        let z0 = ((triangle_aabb.min.z - self.aabb.min.z) * inverse_cell_size) as i32;
        let z1 = ((triangle_aabb.max.z - self.aabb.min.z) * inverse_cell_size) as i32;
        // Use -1 rather than 0 to cut the polygon properly at the start of the field.
        let z0 = z0.clamp(-1, height - 1);
        let z1 = z1.clamp(0, height - 1);

        let mut remaining: Vec<Vec3A> = triangle.to_vec();
        let mut row = Vec::with_capacity(7);
        let mut rest = Vec::with_capacity(7);
        let mut cell = Vec::with_capacity(7);
        let mut row_rest = Vec::with_capacity(7);

        for z in z0..=z1 {
            // Clip polygon to row. Store the remaining polygon as well.
            let cell_z = self.aabb.min.z + z as f32 * self.cell_size;
            divide_poly(&remaining, &mut row, &mut rest, cell_z + self.cell_size, Axis::Z);
            std::mem::swap(&mut remaining, &mut rest);
            if row.len() < 3 || z < 0 {
                continue;
            }

            // Find the x-axis bounds of the row.
            let (min_x, max_x) = row
                .iter()
                .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.x), max.max(v.x)));
            let x0 = ((min_x - self.aabb.min.x) * inverse_cell_size) as i32;
            let x1 = ((max_x - self.aabb.min.x) * inverse_cell_size) as i32;
            if x1 < 0 || x0 >= width {
                continue;
            }
            let x0 = x0.clamp(-1, width - 1);
            let x1 = x1.clamp(0, width - 1);

            for x in x0..=x1 {
                // Clip polygon to column. Store the remaining polygon as well.
                let cell_x = self.aabb.min.x + x as f32 * self.cell_size;
                divide_poly(&row, &mut cell, &mut row_rest, cell_x + self.cell_size, Axis::X);
                std::mem::swap(&mut row, &mut row_rest);
                if cell.len() < 3 || x < 0 {
                    continue;
                }

                // Calculate min and max of the span.
                let (mut span_min, mut span_max) = cell
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.y), max.max(v.y)));
                span_min -= self.aabb.min.y;
                span_max -= self.aabb.min.y;

                match clipping {
                    VerticalClipping::Discard => {
                        // Skip the span if it's completely outside the heightfield bounding box.
                        if span_max < 0.0 || span_min > by {
                            continue;
                        }
                    }
                    VerticalClipping::Clamp => {
                        span_max = span_max.max(0.0);
                        span_min = span_min.min(by);
                    }
                }
                // Clamp the span to the heightfield bounding box.
                let span_min = span_min.max(0.0);
                let span_max = span_max.min(by);

                // Snap the span to the heightfield height grid.
                let min_cell = ((span_min * inverse_cell_height).floor() as i32)
                    .clamp(0, Span::MAX_HEIGHT as i32) as u16;
                let max_cell = ((span_max * inverse_cell_height).ceil() as i32)
                    .clamp(min_cell as i32 + 1, Span::MAX_HEIGHT as i32)
                    as u16;

                self.add_span(SpanInsertion {
                    x: x as u16,
                    z: z as u16,
                    flag_merge_threshold,
                    span: SpanBuilder {
                        min: min_cell,
                        max: max_cell,
                        area,
                        next: None,
                    }
                    .build(),
                })?;
            }
        }
        Ok(())
    }
}

/// Divides a convex polygon into two along an axis-aligned line.
///
/// `below` receives the part with coordinates `<= offset`, `above` the rest.
/// Vertices lying exactly on the line end up in both.
fn divide_poly(
    input: &[Vec3A],
    below: &mut Vec<Vec3A>,
    above: &mut Vec<Vec3A>,
    offset: f32,
    axis: Axis,
) {
    below.clear();
    above.clear();
    let delta: Vec<f32> = input.iter().map(|v| offset - axis.of(*v)).collect();

    let n = input.len();
    for a in 0..n {
        let b = if a == 0 { n - 1 } else { a - 1 };
        let same_side = (delta[a] >= 0.0) == (delta[b] >= 0.0);
        if !same_side {
            let s = delta[b] / (delta[b] - delta[a]);
            let intersection = input[b] + (input[a] - input[b]) * s;
            below.push(intersection);
            above.push(intersection);
            // Add the a vertex to the correct polygon. The b vertex was handled in the previous iteration.
            if delta[a] > 0.0 {
                below.push(input[a]);
            } else if delta[a] < 0.0 {
                above.push(input[a]);
            }
            continue;
        }
        // Same side, add the vertex to the polygon(s) it belongs to.
        if delta[a] >= 0.0 {
            below.push(input[a]);
            if delta[a] != 0.0 {
                continue;
            }
        }
        above.push(input[a]);
    }
}
