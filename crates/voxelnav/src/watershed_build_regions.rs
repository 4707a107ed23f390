//! Watershed partitioning
//!   - seeds one region at every local maximum plateau of the distance field
//!   - floods outward from high to low distance, so regions grow from open areas towards walls
//!   - regions smaller than the configured minimum are merged into their best neighbor or culled
//!   - every decision follows span index order, so equal input always yields equal region ids

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap},
};

use thiserror::Error;

use crate::{CompactHeightfield, region::RegionId};

impl CompactHeightfield {
    /// Non-null regions will consist of connected, non-overlapping walkable spans of a single area.
    ///
    /// Regions with fewer than `min_region_area` spans are merged into the neighboring region of the
    /// same area that shares the longest border with them. Without such a neighbor they are culled,
    /// leaving their spans at [`RegionId::NONE`].
    ///
    /// The region data will be available via [`CompactHeightfield::max_region`]
    /// and [`CompactSpan::region`](crate::CompactSpan::region).
    ///
    /// The distance field must be created using [`CompactHeightfield::build_distance_field`] before attempting to build regions.
    pub fn build_regions(&mut self, min_region_area: usize) -> Result<(), RegionError> {
        let cells = self.span_cells();
        let mut regions = vec![0_u32; self.spans.len()];

        let seed_count = self.seed_regions(&cells, &mut regions);
        self.flood_regions(&cells, &mut regions);
        let merged = self.merge_small_regions(&cells, &mut regions, seed_count, min_region_area);

        // Compact region ids in first appearance order.
        let mut remap = BTreeMap::new();
        for region in regions.iter().filter(|region| **region != 0) {
            let next = remap.len() as u32 + 1;
            remap.entry(*region).or_insert(next);
        }
        let region_count = remap.len();
        if region_count > RegionId::MAX.0 as usize {
            return Err(RegionError::TooManyRegions {
                count: region_count,
            });
        }
        for (span, region) in self.spans.iter_mut().zip(&regions) {
            span.region = remap
                .get(region)
                .map(|id| RegionId(*id as u16))
                .unwrap_or(RegionId::NONE);
        }
        self.max_region = RegionId(region_count as u16);
        tracing::debug!(
            seeds = seed_count,
            merged,
            regions = region_count,
            "Built regions"
        );
        Ok(())
    }

    /// Gives every local maximum plateau its own region. Returns the number of seeded regions.
    fn seed_regions(&self, cells: &[(u16, u16)], regions: &mut [u32]) -> u32 {
        let mut visited = vec![false; self.spans.len()];
        let mut plateau = Vec::new();
        let mut stack = Vec::new();
        let mut next_region = 0;

        for start in 0..self.spans.len() {
            if visited[start] || !self.areas[start].is_walkable() {
                continue;
            }
            let level = self.dist[start];
            let area = self.areas[start];
            let mut is_maximum = true;

            plateau.clear();
            stack.push(start);
            visited[start] = true;
            while let Some(i) = stack.pop() {
                plateau.push(i);
                let (x, z) = cells[i];
                for dir in 0..4 {
                    let Some((_, _, neighbor)) = self.neighbor(x, z, i, dir) else {
                        continue;
                    };
                    if self.areas[neighbor] != area {
                        continue;
                    }
                    match self.dist[neighbor].cmp(&level) {
                        Ordering::Greater => is_maximum = false,
                        Ordering::Equal if !visited[neighbor] => {
                            visited[neighbor] = true;
                            stack.push(neighbor);
                        }
                        _ => {}
                    }
                }
            }

            if is_maximum {
                next_region += 1;
                for &i in &plateau {
                    regions[i] = next_region;
                }
            }
        }
        next_region
    }

    /// Grows the seeded regions into the rest of the walkable spans, highest distance first.
    fn flood_regions(&self, cells: &[(u16, u16)], regions: &mut [u32]) {
        let mut queue: BinaryHeap<FloodEntry> = BinaryHeap::new();
        let mut sequence = 0_u64;
        let push_neighbors =
            |queue: &mut BinaryHeap<FloodEntry>, regions: &[u32], i: usize, sequence: &mut u64| {
                let (x, z) = cells[i];
                for dir in 0..4 {
                    let Some((_, _, neighbor)) = self.neighbor(x, z, i, dir) else {
                        continue;
                    };
                    if regions[neighbor] != 0 || self.areas[neighbor] != self.areas[i] {
                        continue;
                    }
                    queue.push((self.dist[neighbor], Reverse(*sequence), neighbor, regions[i]));
                    *sequence += 1;
                }
            };

        for i in 0..regions.len() {
            if regions[i] != 0 {
                push_neighbors(&mut queue, regions, i, &mut sequence);
            }
        }
        while let Some((_, _, i, region)) = queue.pop() {
            if regions[i] != 0 {
                continue;
            }
            regions[i] = region;
            push_neighbors(&mut queue, regions, i, &mut sequence);
        }
    }

    /// Returns how many regions were merged or culled.
    fn merge_small_regions(
        &self,
        cells: &[(u16, u16)],
        regions: &mut [u32],
        region_count: u32,
        min_region_area: usize,
    ) -> usize {
        let mut sizes = vec![0_usize; region_count as usize + 1];
        for &region in regions.iter() {
            sizes[region as usize] += 1;
        }

        let mut merged = 0;
        for region in 1..=region_count {
            let size = sizes[region as usize];
            if size == 0 || size >= min_region_area {
                continue;
            }

            // Count border edges per neighboring region.
            let mut borders: BTreeMap<u32, usize> = BTreeMap::new();
            for i in (0..regions.len()).filter(|&i| regions[i] == region) {
                let (x, z) = cells[i];
                for dir in 0..4 {
                    let Some((_, _, neighbor)) = self.neighbor(x, z, i, dir) else {
                        continue;
                    };
                    let other = regions[neighbor];
                    if other != 0 && other != region && self.areas[neighbor] == self.areas[i] {
                        *borders.entry(other).or_default() += 1;
                    }
                }
            }
            // Longest border wins, the map iterates in ascending id order so ties keep the lowest id.
            let target = borders
                .iter()
                .fold(None, |best: Option<(u32, usize)>, (&other, &length)| match best {
                    Some((_, best_length)) if best_length >= length => best,
                    _ => Some((other, length)),
                })
                .map(|(other, _)| other)
                .unwrap_or(0);

            for slot in regions.iter_mut().filter(|slot| **slot == region) {
                *slot = target;
            }
            sizes[target as usize] += size;
            sizes[region as usize] = 0;
            merged += 1;
        }
        merged
    }
}

/// Distance, insertion order, span index and the region reaching the span.
type FloodEntry = (u16, Reverse<u64>, usize, u32);

/// Errors that can occur when partitioning a [`CompactHeightfield`] into regions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// More regions than a [`RegionId`] can represent.
    #[error("Partitioning produced {count} regions, but at most {} are supported", RegionId::MAX.0)]
    TooManyRegions {
        /// The number of regions after merging.
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, HeightfieldBuilder, heightfield::SpanInsertion, span::AreaType, span::SpanBuilder,
    };

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
        compact
    }

    #[test]
    fn open_square_is_a_single_region() {
        let mut field = field(10, 10, |_, _| AreaType::DEFAULT_WALKABLE);
        field.build_regions(8).unwrap();
        assert_eq!(field.max_region, RegionId(1));
        assert!(field.spans.iter().all(|span| span.region == RegionId(1)));
    }

    #[test]
    fn areas_never_share_a_region() {
        let mut field = field(12, 6, |x, _| {
            if x < 6 {
                AreaType(1)
            } else {
                AreaType(2)
            }
        });
        field.build_regions(4).unwrap();
        assert_eq!(field.max_region, RegionId(2));
        let left = field.spans[field.cell_at(0, 0).index() as usize].region;
        let right = field.spans[field.cell_at(11, 5).index() as usize].region;
        assert_ne!(left, right);
        assert_eq!(left, RegionId(1));
    }

    #[test]
    fn isolated_small_island_is_culled() {
        let mut field = field(9, 9, |x, z| {
            if (x == 4 && z >= 4) || (z == 4 && x >= 4) {
                AreaType::NOT_WALKABLE
            } else if x > 4 && z > 4 {
                // A 4x4 island that is too small
                AreaType(3)
            } else {
                AreaType::DEFAULT_WALKABLE
            }
        });
        field.build_regions(17).unwrap();
        assert!(field.spans[0].region.is_some());
        for z in 5..9 {
            for x in 5..9 {
                let i = field.cell_at(x, z).index() as usize;
                assert_eq!(field.spans[i].region, RegionId::NONE);
            }
        }
    }

    #[test]
    fn partitioning_is_deterministic() {
        let area_at = |x: u16, z: u16| {
            if (x + 2 * z) % 7 == 0 {
                AreaType::NOT_WALKABLE
            } else {
                AreaType::DEFAULT_WALKABLE
            }
        };
        let mut a = field(16, 16, area_at);
        let mut b = field(16, 16, area_at);
        a.build_regions(3).unwrap();
        b.build_regions(3).unwrap();
        assert_eq!(a.spans, b.spans);
        assert!(a.max_region.is_some());
    }
}
