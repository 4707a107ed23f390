//! Agent clearance. Distances are measured with a 2-3 chamfer metric in half-cell units:
//! a cardinal step costs 2, a diagonal step costs 3.

use crate::{CompactHeightfield, span::AreaType};

impl CompactHeightfield {
    /// Erode the walkable area by agent radius.
    ///
    /// `threshold` is the clearance in half-cell units, usually `ceil(2 * radius / cell_size)`.
    /// Every span closer than that to a boundary becomes unwalkable. A threshold of 0 leaves the field untouched.
    pub fn erode_walkable_area(&mut self, threshold: u16) {
        if threshold == 0 {
            return;
        }
        let mut distance_to_boundary = vec![u16::MAX; self.spans.len()];

        // Mark boundary cells.
        self.for_each_span(|x, z, i| {
            if !self.areas[i].is_walkable() {
                distance_to_boundary[i] = 0;
                return;
            }
            // Check that there is a walkable adjacent span in each of the 4 cardinal directions.
            let neighbor_count = (0..4)
                .filter_map(|dir| self.neighbor(x, z, i, dir))
                .filter(|&(_, _, neighbor)| self.areas[neighbor].is_walkable())
                .count();
            // At least one missing neighbour, so this is a boundary cell.
            if neighbor_count != 4 {
                distance_to_boundary[i] = 0;
            }
        });

        self.propagate_chamfer_distance(&mut distance_to_boundary);

        let mut eroded = 0_usize;
        for (area, distance) in self.areas.iter_mut().zip(&distance_to_boundary) {
            if *distance < threshold && area.is_walkable() {
                *area = AreaType::NOT_WALKABLE;
                eroded += 1;
            }
        }
        tracing::debug!(threshold, eroded, "Eroded walkable area");
    }

    /// Two sweeps over the field, relaxing every span against its already visited neighbors.
    ///
    /// Spans holding 0 act as sources, every other span must be initialized to a large value.
    pub(crate) fn propagate_chamfer_distance(&self, distances: &mut [u16]) {
        // Pass 1: from the (0, 0) corner, looking at the (-1, 0), (-1, -1), (0, -1) and (1, -1) neighbors.
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).span_range() {
                    self.relax(distances, x, z, i, 0, 3);
                    self.relax(distances, x, z, i, 3, 2);
                }
            }
        }
        // Pass 2: from the opposite corner, looking at (1, 0), (1, 1), (0, 1) and (-1, 1).
        for z in (0..self.height).rev() {
            for x in (0..self.width).rev() {
                for i in self.cell_at(x, z).span_range() {
                    self.relax(distances, x, z, i, 2, 1);
                    self.relax(distances, x, z, i, 1, 0);
                }
            }
        }
    }

    /// Relaxes span `i` against its neighbor in `dir` (cost 2) and the diagonal reached by turning to `diagonal_dir` from there (cost 3).
    #[inline]
    fn relax(&self, distances: &mut [u16], x: u16, z: u16, i: usize, dir: u8, diagonal_dir: u8) {
        let Some((a_x, a_z, a_i)) = self.neighbor(x, z, i, dir) else {
            return;
        };
        distances[i] = distances[i].min(distances[a_i].saturating_add(2));
        if let Some((_, _, b_i)) = self.neighbor(a_x, a_z, a_i, diagonal_dir) {
            distances[i] = distances[i].min(distances[b_i].saturating_add(3));
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, Heightfield, HeightfieldBuilder, heightfield::SpanInsertion, span::SpanBuilder,
    };

    use super::*;

    fn flat(size: u16) -> CompactHeightfield {
        let mut heightfield: Heightfield = HeightfieldBuilder {
            aabb: Aabb3d {
                min: Vec3A::ZERO,
                max: Vec3A::new(size as f32, 10.0, size as f32),
            },
            cell_size: 1.0,
            cell_height: 1.0,
            max_columns: HeightfieldBuilder::DEFAULT_MAX_COLUMNS,
        }
        .build()
        .unwrap();
        for z in 0..size {
            for x in 0..size {
                heightfield
                    .add_span(SpanInsertion {
                        x,
                        z,
                        flag_merge_threshold: 0,
                        span: SpanBuilder {
                            min: 0,
                            max: 1,
                            area: AreaType::DEFAULT_WALKABLE,
                            next: None,
                        }
                        .build(),
                    })
                    .unwrap();
            }
        }
        CompactHeightfield::from_heightfield(&heightfield, 2, 1).unwrap()
    }

    #[test]
    fn zero_threshold_keeps_every_span() {
        let mut field = flat(5);
        field.erode_walkable_area(0);
        assert_eq!(field.walkable_span_count(), 25);
    }

    #[test]
    fn one_cell_of_clearance_removes_the_outer_ring() {
        let mut field = flat(5);
        field.erode_walkable_area(2);
        assert_eq!(field.walkable_span_count(), 9);
        let center = field.cell_at(2, 2).index() as usize;
        assert!(field.areas[center].is_walkable());
    }

    #[test]
    fn erosion_never_adds_walkable_spans() {
        let mut previous = flat(7).walkable_span_count();
        for threshold in 1..8 {
            let mut field = flat(7);
            field.erode_walkable_area(threshold);
            let count = field.walkable_span_count();
            assert!(count <= previous, "threshold {threshold}");
            previous = count;
        }
    }
}
