use crate::{
    Aabb3d,
    compact_cell::CompactCell,
    compact_span::CompactSpan,
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    region::RegionId,
    span::AreaType,
};

/// A packed representation of the open space of a [`Heightfield`].
///
/// Only the walkable gaps above solid spans are kept. Every open span knows its
/// four cardinal neighbors through [`CompactSpan::con`].
#[derive(Debug, Clone)]
pub struct CompactHeightfield {
    /// Number of columns along x.
    pub width: u16,
    /// Number of columns along z.
    pub height: u16,
    /// Clearance an agent needs, in voxels.
    pub walkable_height: u16,
    /// Largest step an agent can take, in voxels.
    pub walkable_climb: u16,
    /// Largest value in [`CompactHeightfield::dist`].
    pub max_distance: u16,
    /// Highest region id handed out so far.
    pub max_region: RegionId,
    /// World bounds, raised by the agent height.
    pub aabb: Aabb3d,
    /// Horizontal edge length of a voxel.
    pub cell_size: f32,
    /// Vertical edge length of a voxel.
    pub cell_height: f32,
    /// One entry per column, row by row along x.
    pub cells: Vec<CompactCell>,
    /// The open spans of all columns.
    pub spans: Vec<CompactSpan>,
    /// Distance of each span to the nearest border, parallel to `spans`.
    pub dist: Vec<u16>,
    /// Area of each span, parallel to `spans`.
    pub areas: Vec<AreaType>,
}

impl CompactHeightfield {
    const MAX_HEIGHT: u16 = u16::MAX;
    const MAX_LAYERS: u8 = CompactSpan::NOT_CONNECTED - 1;

    /// Collects the open space above every walkable span and links neighboring spans.
    ///
    /// # Errors
    ///
    /// Returns an error if a column holds more open spans than a neighbor link can address.
    pub fn from_heightfield(
        heightfield: &Heightfield,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<Self, CompactHeightfieldError> {
        let open_spans = heightfield.walkable_span_count();
        let mut field = Self {
            width: heightfield.width,
            height: heightfield.height,
            walkable_height,
            walkable_climb,
            aabb: heightfield.aabb,
            max_distance: 0,
            max_region: RegionId::NONE,
            cell_size: heightfield.cell_size,
            cell_height: heightfield.cell_height,
            cells: Vec::with_capacity(heightfield.width as usize * heightfield.height as usize),
            spans: Vec::with_capacity(open_spans),
            dist: vec![0; open_spans],
            areas: Vec::with_capacity(open_spans),
        };
        // The open space may reach up to an agent's height above the highest floor.
        field.aabb.max.y += walkable_height as f32 * field.cell_height;

        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                let mut cell = CompactCell::default();
                cell.set_index(field.spans.len() as u32);
                for key in heightfield.column_keys(x, z) {
                    let solid = heightfield.span(key);
                    if !solid.area().is_walkable() {
                        continue;
                    }
                    let floor = solid.max();
                    let ceiling = solid
                        .next()
                        .map_or(Self::MAX_HEIGHT, |next| heightfield.span(next).min());
                    let clearance = ceiling.saturating_sub(floor).min(u8::MAX.into()) as u8;
                    field.spans.push(CompactSpan::new(floor, clearance));
                    field.areas.push(solid.area());
                    cell.inc_count();
                }
                field.cells.push(cell);
            }
        }

        field.link_neighbors()?;
        Ok(field)
    }

    /// Links every span to the first span of each neighboring column an agent can step onto.
    fn link_neighbors(&mut self) -> Result<(), CompactHeightfieldError> {
        let mut deepest_layer = 0_usize;
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).span_range() {
                    for dir in 0..4_u8 {
                        let link = self.find_link(x, z, i, dir);
                        if let Some(layer) = link {
                            deepest_layer = deepest_layer.max(layer);
                        }
                        let link = link
                            .filter(|layer| *layer < Self::MAX_LAYERS as usize)
                            .map(|layer| layer as u8);
                        self.spans[i].set_con(dir, link);
                    }
                }
            }
        }
        if deepest_layer >= Self::MAX_LAYERS as usize {
            return Err(CompactHeightfieldError::TooManyLayers {
                max_layer_index: Self::MAX_LAYERS,
                layer_index: deepest_layer,
            });
        }
        Ok(())
    }

    /// The layer of the span in direction `dir` of span `i` that is tall enough and close enough in height.
    fn find_link(&self, x: u16, z: u16, i: usize, dir: u8) -> Option<usize> {
        let neighbor_x = x as i32 + dir_offset_x(dir) as i32;
        let neighbor_z = z as i32 + dir_offset_z(dir) as i32;
        if neighbor_x < 0 || neighbor_z < 0 {
            return None;
        }
        let neighbor_cell = self.get_cell_at(neighbor_x as u16, neighbor_z as u16)?;
        let span = &self.spans[i];
        let span_top = span.y as i32 + span.height as i32;
        neighbor_cell.span_range().position(|k| {
            let neighbor = &self.spans[k];
            let gap_floor = span.y.max(neighbor.y) as i32;
            let gap_ceiling = span_top.min(neighbor.y as i32 + neighbor.height as i32);
            gap_ceiling - gap_floor >= self.walkable_height as i32
                && (neighbor.y as i32 - span.y as i32).abs() <= self.walkable_climb as i32
        })
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    /// The column at `(x, z)`, if it lies inside the grid.
    #[inline]
    pub fn get_cell_at(&self, x: u16, z: u16) -> Option<&CompactCell> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.cells.get(self.column_index(x, z))
    }

    /// The column at `(x, z)`.
    #[inline]
    pub fn cell_at(&self, x: u16, z: u16) -> &CompactCell {
        &self.cells[self.column_index(x, z)]
    }

    /// Follows the connection of span `i` at `(x, z)` in direction `dir`.
    ///
    /// Returns the neighbor's cell coordinates and span index, or `None` if there is no connection.
    #[inline]
    pub fn neighbor(&self, x: u16, z: u16, i: usize, dir: u8) -> Option<(u16, u16, usize)> {
        let con = self.spans[i].con(dir)?;
        let neighbor_x = (x as i32 + dir_offset_x(dir) as i32) as u16;
        let neighbor_z = (z as i32 + dir_offset_z(dir) as i32) as u16;
        let neighbor_i = self.cell_at(neighbor_x, neighbor_z).index() as usize + con as usize;
        Some((neighbor_x, neighbor_z, neighbor_i))
    }

    /// Number of spans that are still walkable.
    pub fn walkable_span_count(&self) -> usize {
        self.areas.iter().filter(|area| area.is_walkable()).count()
    }

    /// Calls `f` with `(x, z, span_index)` for every span, in lexicographic `(z, x, layer)` order.
    pub(crate) fn for_each_span(&self, mut f: impl FnMut(u16, u16, usize)) {
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).span_range() {
                    f(x, z, i);
                }
            }
        }
    }

    /// The `(x, z)` cell of every span, indexed like [`CompactHeightfield::spans`].
    pub(crate) fn span_cells(&self) -> Vec<(u16, u16)> {
        let mut cells = vec![(0, 0); self.spans.len()];
        self.for_each_span(|x, z, i| cells[i] = (x, z));
        cells
    }
}

/// Errors returned by [`CompactHeightfield::from_heightfield`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompactHeightfieldError {
    /// A column stacks more open spans than a neighbor link can address.
    #[error("A neighbor link would need layer {layer_index}, but the last addressable layer is {max_layer_index}")]
    TooManyLayers {
        /// Last layer a link can point at.
        max_layer_index: u8,
        /// Deepest layer that was needed.
        layer_index: usize,
    },
}
