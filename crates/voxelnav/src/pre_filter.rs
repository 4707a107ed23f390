use crate::{
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    span::{AreaType, Span, SpanKey},
};

impl Heightfield {
    /// Marks non-walkable spans as walkable if their top is within `walkable_climb` of a walkable span below them.
    ///
    /// This allows the agent to step over curbs and stair steps that were rasterized as obstacles.
    pub fn filter_low_hanging_walkable_obstacles(&mut self, walkable_climb: u16) {
        for z in 0..self.height {
            for x in 0..self.width {
                let mut previous: Option<(u16, bool, AreaType)> = None;
                let keys: Vec<SpanKey> = self.column_keys(x, z).collect();

                // For each span in the column...
                for key in keys {
                    let span = self.span_mut(key);
                    let walkable = span.area().is_walkable();

                    // If current span is not walkable, but there is walkable span just below it and the height difference
                    // is small enough for the agent to walk over, mark the current span as walkable too.
                    if let Some((previous_max, previous_was_walkable, previous_area)) = previous {
                        if !walkable
                            && previous_was_walkable
                            && (span.max() as i32 - previous_max as i32).abs()
                                <= walkable_climb as i32
                        {
                            span.set_area(previous_area);
                        }
                    }

                    // Compare against the area before this pass.
                    // This prevents multiple consecutive non-walkable spans from being erroneously marked as walkable.
                    previous = Some((span.max(), walkable, span.area()));
                }
            }
        }
    }

    /// Marks spans that are ledges as unwalkable.
    ///
    /// A ledge is a span with a neighbor it could stand next to whose floor is more than `walkable_climb` lower,
    /// or a span whose accessible neighbors differ too much in height (a steep slope).
    /// Columns without any span are not treated as drops.
    pub fn filter_ledge_spans(&mut self, walkable_height: u16, walkable_climb: u16) {
        let walkable_height = walkable_height as i32;
        let walkable_climb = walkable_climb as i32;
        let mut ledges = Vec::new();

        for z in 0..self.height {
            for x in 0..self.width {
                for key in self.column_keys(x, z) {
                    let span = self.span(key);
                    if !span.area().is_walkable() {
                        continue;
                    }
                    let bot = span.max() as i32;
                    let top = self.ceiling_of(span);

                    let mut lowest_neighbor = Span::MAX_HEIGHT as i32;
                    let mut accessible_min = bot;
                    let mut accessible_max = bot;

                    for dir in 0..4 {
                        let neighbor_x = x as i32 + dir_offset_x(dir) as i32;
                        let neighbor_z = z as i32 + dir_offset_z(dir) as i32;
                        if !self.contains(neighbor_x, neighbor_z) {
                            continue;
                        }
                        for neighbor_key in self.column_keys(neighbor_x as u16, neighbor_z as u16) {
                            let neighbor = self.span(neighbor_key);
                            let neighbor_bot = neighbor.max() as i32;
                            let neighbor_top = self.ceiling_of(neighbor);

                            // Skip neighbor if the gap between the spans is too small.
                            if top.min(neighbor_top) - bot.max(neighbor_bot) <= walkable_height {
                                continue;
                            }
                            lowest_neighbor = lowest_neighbor.min(neighbor_bot - bot);

                            // Find min/max accessible neighbor height.
                            if (neighbor_bot - bot).abs() <= walkable_climb {
                                accessible_min = accessible_min.min(neighbor_bot);
                                accessible_max = accessible_max.max(neighbor_bot);
                            }
                        }
                    }

                    if lowest_neighbor < -walkable_climb
                        || accessible_max - accessible_min > walkable_climb
                    {
                        ledges.push(key);
                    }
                }
            }
        }

        for key in ledges {
            self.span_mut(key).set_area(AreaType::NOT_WALKABLE);
        }
    }

    /// Marks walkable spans as unwalkable if the clearance above them is less than `walkable_height`.
    pub fn filter_walkable_low_height_spans(&mut self, walkable_height: u16) {
        let mut blocked = Vec::new();
        for (key, span) in self.allocated_spans.iter() {
            let bot = span.max() as i32;
            let top = self.ceiling_of(span);
            if top - bot < walkable_height as i32 {
                blocked.push(key);
            }
        }
        for key in blocked {
            self.span_mut(key).set_area(AreaType::NOT_WALKABLE);
        }
    }

    #[inline]
    fn ceiling_of(&self, span: &Span) -> i32 {
        span.next()
            .map(|next| self.span(next).min() as i32)
            .unwrap_or(Span::MAX_HEIGHT as i32)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, HeightfieldBuilder,
        heightfield::SpanInsertion,
        span::SpanBuilder,
    };

    use super::*;

    fn heightfield() -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d {
                min: Vec3A::ZERO,
                max: Vec3A::new(3.0, 10.0, 3.0),
            },
            cell_size: 1.0,
            cell_height: 1.0,
            max_columns: HeightfieldBuilder::DEFAULT_MAX_COLUMNS,
        }
        .build()
        .unwrap()
    }

    fn add(heightfield: &mut Heightfield, x: u16, z: u16, min: u16, max: u16, area: AreaType) {
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: 0,
                span: SpanBuilder {
                    min,
                    max,
                    area,
                    next: None,
                }
                .build(),
            })
            .unwrap();
    }

    fn flat(heightfield: &mut Heightfield, max: u16) {
        for z in 0..3 {
            for x in 0..3 {
                add(heightfield, x, z, 0, max, AreaType::DEFAULT_WALKABLE);
            }
        }
    }

    #[test]
    fn low_obstacle_on_walkable_span_becomes_walkable() {
        let mut heightfield = heightfield();
        add(&mut heightfield, 1, 1, 0, 1, AreaType::DEFAULT_WALKABLE);
        add(&mut heightfield, 1, 1, 3, 2 + 3, AreaType::NOT_WALKABLE);
        heightfield.filter_low_hanging_walkable_obstacles(4);
        let top = heightfield.column_keys(1, 1).last().unwrap();
        assert!(heightfield.span(top).area().is_walkable());

        let mut strict = heightfield.clone();
        strict.span_mut(top).set_area(AreaType::NOT_WALKABLE);
        strict.filter_low_hanging_walkable_obstacles(3);
        assert!(!strict.span(top).area().is_walkable());
    }

    #[test]
    fn flat_ground_has_no_ledges() {
        let mut heightfield = heightfield();
        flat(&mut heightfield, 1);
        heightfield.filter_ledge_spans(2, 1);
        assert_eq!(heightfield.walkable_span_count(), 9);
    }

    #[test]
    fn pillar_top_is_a_ledge() {
        let mut heightfield = heightfield();
        flat(&mut heightfield, 1);
        add(&mut heightfield, 1, 1, 0, 6, AreaType::DEFAULT_WALKABLE);
        heightfield.filter_ledge_spans(2, 1);
        assert!(!heightfield.span_at(1, 1).unwrap().area().is_walkable());
        assert_eq!(heightfield.walkable_span_count(), 8);
    }

    #[test]
    fn low_ceiling_blocks_span() {
        let mut heightfield = heightfield();
        add(&mut heightfield, 0, 0, 0, 1, AreaType::DEFAULT_WALKABLE);
        add(&mut heightfield, 0, 0, 2, 3, AreaType::DEFAULT_WALKABLE);
        add(&mut heightfield, 1, 0, 0, 1, AreaType::DEFAULT_WALKABLE);
        heightfield.filter_walkable_low_height_spans(2);
        assert!(!heightfield.span_at(0, 0).unwrap().area().is_walkable());
        assert!(heightfield.span_at(1, 0).unwrap().area().is_walkable());
    }
}
