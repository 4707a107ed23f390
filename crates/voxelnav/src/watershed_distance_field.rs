//! Distance to the nearest region boundary, the landscape the watershed partitioning floods.

use crate::CompactHeightfield;

impl CompactHeightfield {
    /// Prepare for region partitioning, by calculating distance field along the walkable surface.
    ///
    /// A span is a boundary span if one of its four neighbors is missing or carries a different area.
    pub fn build_distance_field(&mut self) {
        let mut src = vec![u16::MAX; self.spans.len()];
        self.max_distance = self.calculate_distance_field(&mut src);

        let mut dst = vec![0_u16; self.spans.len()];
        self.box_blur(1, &src, &mut dst);
        self.dist = dst;
        tracing::debug!(max_distance = self.max_distance, "Built distance field");
    }

    fn calculate_distance_field(&self, src: &mut [u16]) -> u16 {
        // Mark boundary cells.
        self.for_each_span(|x, z, i| {
            let area = self.areas[i];
            let same_area_neighbors = (0..4)
                .filter_map(|dir| self.neighbor(x, z, i, dir))
                .filter(|&(_, _, neighbor)| self.areas[neighbor] == area)
                .count();
            if same_area_neighbors != 4 {
                src[i] = 0;
            }
        });

        self.propagate_chamfer_distance(src);
        src.iter().copied().max().unwrap_or(0)
    }

    /// Smooths the distance field with a 3x3 box filter.
    /// Values at or below `2 * threshold` are copied as they are so thin corridors keep their shape.
    fn box_blur(&self, threshold: u16, src: &[u16], dst: &mut [u16]) {
        let threshold = threshold * 2;
        self.for_each_span(|x, z, i| {
            let center = src[i];
            if center <= threshold {
                dst[i] = center;
                return;
            }

            let mut sum = center as u32;
            for dir in 0..4 {
                let Some((a_x, a_z, a_i)) = self.neighbor(x, z, i, dir) else {
                    sum += center as u32 * 2;
                    continue;
                };
                sum += src[a_i] as u32;
                let diagonal_dir = (dir + 1) & 0x3;
                match self.neighbor(a_x, a_z, a_i, diagonal_dir) {
                    Some((_, _, b_i)) => sum += src[b_i] as u32,
                    None => sum += center as u32,
                }
            }
            dst[i] = ((sum + 5) / 9) as u16;
        });
    }
}
