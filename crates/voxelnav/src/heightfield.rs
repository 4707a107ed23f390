//! Solid voxel columns produced by rasterization.

use thiserror::Error;

use crate::{
    Aabb3d,
    span::{Span, SpanKey, Spans},
};

/// A layered voxel grid. Every `(x, z)` column holds a linked list of solid spans, lowest first.
///
/// Created by [`HeightfieldBuilder::build`].
#[derive(Debug, Clone)]
pub struct Heightfield {
    /// Number of columns along x.
    pub width: u16,
    /// Number of columns along z.
    pub height: u16,
    /// World bounds covered by the grid.
    pub aabb: Aabb3d,
    /// Horizontal edge length of a voxel.
    pub cell_size: f32,
    /// Vertical edge length of a voxel.
    pub cell_height: f32,
    /// The lowest span of every column, row by row along x.
    pub spans: Vec<Option<SpanKey>>,
    /// Storage for the spans of all columns.
    pub allocated_spans: Spans,
}

impl Heightfield {
    /// Inserts a solid span, merging it with every span of the column it touches.
    pub(crate) fn add_span(&mut self, insertion: SpanInsertion) -> Result<(), SpanInsertionError> {
        let SpanInsertion {
            x,
            z,
            flag_merge_threshold,
            mut span,
        } = insertion;
        if x >= self.width || z >= self.height {
            return Err(SpanInsertionError::ColumnIndexOutOfBounds { x, z });
        }
        let column = self.column_index(x, z);

        let mut below = None;
        let mut cursor = self.spans[column];
        while let Some(key) = cursor {
            let existing = self.span(key);
            if existing.min() > span.max() {
                break;
            }
            cursor = existing.next();
            if existing.max() < span.min() {
                below = Some(key);
                continue;
            }
            let (min, max, area) = (existing.min(), existing.max(), existing.area());
            span.set_min(span.min().min(min));
            span.set_max(span.max().max(max));
            if span.max().abs_diff(max) <= flag_merge_threshold {
                span.set_area(span.area().max(area));
            }
            self.allocated_spans.remove(key);
            self.relink(column, below, cursor);
        }

        let above = match below {
            Some(key) => self.span(key).next(),
            None => self.spans[column],
        };
        span.set_next(above);
        let key = self.allocated_spans.insert(span);
        self.relink(column, below, Some(key));
        Ok(())
    }

    /// Points `previous`, or the column head if there is none, at `next`.
    fn relink(&mut self, column: usize, previous: Option<SpanKey>, next: Option<SpanKey>) {
        match previous {
            Some(previous) => self.span_mut(previous).set_next(next),
            None => self.spans[column] = next,
        }
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    #[inline]
    pub(crate) fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width as i32 && z >= 0 && z < self.height as i32
    }

    /// The key of the lowest span of a column, if the column exists and is not empty.
    #[inline]
    pub fn span_key_at(&self, x: u16, z: u16) -> Option<SpanKey> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.spans[self.column_index(x, z)]
    }

    /// The lowest span of a column.
    #[inline]
    pub fn span_at(&self, x: u16, z: u16) -> Option<&Span> {
        self.span_key_at(x, z).map(|key| self.span(key))
    }

    /// Iterates over the keys of all spans in a column, from the lowest to the highest.
    pub fn column_keys(&self, x: u16, z: u16) -> impl Iterator<Item = SpanKey> + '_ {
        std::iter::successors(self.span_key_at(x, z), move |key| self.span(*key).next())
    }

    /// The span behind `key`.
    ///
    /// # Panics
    ///
    /// Panics if the span was removed.
    #[inline]
    pub fn span(&self, key: SpanKey) -> &Span {
        &self.allocated_spans[key]
    }

    /// Mutable access to the span behind `key`.
    #[inline]
    pub fn span_mut(&mut self, key: SpanKey) -> &mut Span {
        &mut self.allocated_spans[key]
    }

    /// Number of spans whose top surface is walkable.
    pub fn walkable_span_count(&self) -> usize {
        self.allocated_spans
            .values()
            .filter(|span| span.area().is_walkable())
            .count()
    }
}

/// Grid settings for an empty [`Heightfield`].
#[derive(Debug, Clone)]
pub struct HeightfieldBuilder {
    /// World bounds to voxelize.
    pub aabb: Aabb3d,
    /// Horizontal edge length of a voxel.
    pub cell_size: f32,
    /// Vertical edge length of a voxel.
    pub cell_height: f32,
    /// The largest accepted number of columns (`width * height`).
    pub max_columns: usize,
}

impl HeightfieldBuilder {
    /// Default for [`HeightfieldBuilder::max_columns`].
    pub const DEFAULT_MAX_COLUMNS: usize = 1 << 24;

    /// Computes the grid dimensions of the field without allocating it.
    pub fn grid_size(&self) -> Result<(u16, u16), HeightfieldBuilderError> {
        let positive = self.cell_size > 0.0 && self.cell_height > 0.0;
        if !positive {
            return Err(HeightfieldBuilderError::InvalidCellSize {
                cell_size: self.cell_size,
                cell_height: self.cell_height,
            });
        }
        let width = (self.aabb.max.x - self.aabb.min.x) / self.cell_size + 0.5;
        let height = (self.aabb.max.z - self.aabb.min.z) / self.cell_size + 0.5;
        let column_count = width.max(0.0) as u128 * height.max(0.0) as u128;
        if width >= u16::MAX as f32
            || height >= u16::MAX as f32
            || column_count > self.max_columns as u128
        {
            return Err(HeightfieldBuilderError::ColumnCountTooLarge {
                width,
                height,
                max: self.max_columns,
            });
        }
        Ok((width.max(0.0) as u16, height.max(0.0) as u16))
    }

    /// Allocates an empty heightfield.
    pub fn build(self) -> Result<Heightfield, HeightfieldBuilderError> {
        let (width, height) = self.grid_size()?;
        let column_count = width as usize * height as usize;
        Ok(Heightfield {
            width,
            height,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            spans: vec![None; column_count],
            allocated_spans: Spans::with_min_capacity(column_count),
        })
    }
}

/// Errors returned by [`HeightfieldBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeightfieldBuilderError {
    /// Happens when the cell dimensions are not strictly positive.
    #[error("Cell size and cell height must be positive, got {cell_size} and {cell_height}")]
    InvalidCellSize {
        /// The requested horizontal voxel size.
        cell_size: f32,
        /// The requested vertical voxel size.
        cell_height: f32,
    },
    /// Happens when the grid would exceed the column limit.
    #[error("Column count (width*height) is too large, got {width}*{height} but max is {max}")]
    ColumnCountTooLarge {
        /// Columns along x.
        width: f32,
        /// Columns along z.
        height: f32,
        /// The largest accepted column count.
        max: usize,
    },
}

/// Errors that can occur when rasterizing into a [`Heightfield`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanInsertionError {
    /// The target column lies outside the grid.
    #[error("Column ({x}, {z}) lies outside the heightfield")]
    ColumnIndexOutOfBounds {
        /// Column along x.
        x: u16,
        /// Column along z.
        z: u16,
    },
}

pub(crate) struct SpanInsertion {
    pub(crate) x: u16,
    pub(crate) z: u16,
    /// Largest difference between two span tops for which their areas are merged.
    pub(crate) flag_merge_threshold: u16,
    pub(crate) span: Span,
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;
    use crate::span::{AreaType, SpanBuilder};

    fn field(max_columns: usize) -> Result<Heightfield, HeightfieldBuilderError> {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [5.0, 5.0, 5.0]),
            cell_size: 1.0,
            cell_height: 1.0,
            max_columns,
        }
        .build()
    }

    fn solid(min: u16, max: u16, area: u8) -> Span {
        SpanBuilder {
            min,
            max,
            area: AreaType(area),
            next: None,
        }
        .build()
    }

    fn add(field: &mut Heightfield, x: u16, z: u16, span: Span) {
        field
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: 1,
                span,
            })
            .unwrap();
    }

    /// `(min, max, area)` of every span in a column, bottom up.
    fn column(field: &Heightfield, x: u16, z: u16) -> Vec<(u16, u16, u8)> {
        field
            .column_keys(x, z)
            .map(|key| {
                let span = field.span(key);
                (span.min(), span.max(), span.area().0)
            })
            .collect()
    }

    #[test]
    fn grid_covers_the_bounds() {
        let field = field(HeightfieldBuilder::DEFAULT_MAX_COLUMNS).unwrap();
        assert_eq!((field.width, field.height), (10, 10));
        assert_eq!(field.spans.len(), 100);
        assert!(field.column_keys(4, 4).next().is_none());
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(matches!(
            field(99),
            Err(HeightfieldBuilderError::ColumnCountTooLarge { max: 99, .. })
        ));
        let flat = HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [5.0, 5.0, 5.0]),
            cell_size: 0.0,
            cell_height: 1.0,
            max_columns: 100,
        };
        assert!(matches!(
            flat.build(),
            Err(HeightfieldBuilderError::InvalidCellSize { .. })
        ));
    }

    #[test]
    fn columns_stay_sorted() {
        let mut field = field(100).unwrap();
        add(&mut field, 2, 7, solid(8, 10, 3));
        add(&mut field, 2, 7, solid(2, 4, 3));
        add(&mut field, 2, 7, solid(5, 6, 3));
        add(&mut field, 3, 7, solid(1, 1, 3));
        assert_eq!(
            column(&field, 2, 7),
            vec![(2, 4, 3), (5, 6, 3), (8, 10, 3)]
        );
        assert_eq!(column(&field, 3, 7), vec![(1, 1, 3)]);
        assert_eq!(field.span_at(7, 2), None);
    }

    #[test]
    fn overlapping_spans_merge() {
        let mut field = field(100).unwrap();
        add(&mut field, 1, 1, solid(2, 4, 2));
        add(&mut field, 1, 1, solid(8, 10, 5));
        add(&mut field, 1, 1, solid(3, 9, 7));
        // The top of the area 5 span is within the merge threshold, and the higher area 7 wins.
        assert_eq!(column(&field, 1, 1), vec![(2, 10, 7)]);
        assert_eq!(field.allocated_spans.len(), 1);
    }

    #[test]
    fn distant_tops_keep_the_new_area() {
        let mut field = field(100).unwrap();
        add(&mut field, 0, 0, solid(0, 3, 9));
        add(&mut field, 0, 0, solid(2, 8, 4));
        assert_eq!(column(&field, 0, 0), vec![(0, 8, 4)]);
    }

    #[test]
    fn out_of_bounds_columns_are_rejected() {
        let mut field = field(100).unwrap();
        let result = field.add_span(SpanInsertion {
            x: 10,
            z: 0,
            flag_merge_threshold: 0,
            span: solid(0, 1, 1),
        });
        assert_eq!(
            result,
            Err(SpanInsertionError::ColumnIndexOutOfBounds { x: 10, z: 0 })
        );
    }
}
