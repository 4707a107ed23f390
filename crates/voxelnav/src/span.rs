//! Solid spans of a [`Heightfield`](crate::Heightfield) and the area ids they carry.

use std::ops::{Deref, DerefMut};

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// A key for a [`Span`] in [`Spans`].
    pub struct SpanKey;
}

/// The slot map holding every span of a heightfield.
#[derive(Debug, Clone, Default)]
pub struct Spans(SlotMap<SpanKey, Span>);

impl Deref for Spans {
    type Target = SlotMap<SpanKey, Span>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Spans {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Spans {
    const DEFAULT_CAPACITY: usize = 1024;

    pub(crate) fn with_min_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(Self::DEFAULT_CAPACITY);
        Self(SlotMap::with_capacity_and_key(capacity))
    }
}

/// Builds a [`Span`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanBuilder {
    /// Height of the floor of the solid span.
    pub min: u16,
    /// Height of the top of the solid span.
    pub max: u16,
    /// Area type of the top surface.
    pub area: AreaType,
    /// The next-higher span in the column.
    pub next: Option<SpanKey>,
}

impl SpanBuilder {
    /// Builds the span.
    pub fn build(self) -> Span {
        Span {
            min: self.min,
            max: self.max,
            area: self.area,
            next: self.next,
        }
    }
}

impl From<SpanBuilder> for Span {
    fn from(builder: SpanBuilder) -> Self {
        builder.build()
    }
}

/// A solid span of voxels in a heightfield column. Build with [`SpanBuilder`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Span {
    /// Height of the floor. [Units: ch]
    min: u16,
    /// Height of the ceiling. [Units: ch]
    max: u16,
    /// Area type ID.
    area: AreaType,
    /// The span above this one in its column.
    next: Option<SpanKey>,
}

impl Span {
    /// The highest representable span height.
    pub const MAX_HEIGHT: u16 = (1 << 13) - 1;

    /// Height of the floor of the solid span.
    #[inline]
    pub fn min(&self) -> u16 {
        self.min
    }

    #[inline]
    pub(crate) fn set_min(&mut self, min: u16) {
        self.min = min;
    }

    /// Height of the top of the solid span, i.e. the surface an agent stands on.
    #[inline]
    pub fn max(&self) -> u16 {
        self.max
    }

    #[inline]
    pub(crate) fn set_max(&mut self, max: u16) {
        self.max = max;
    }

    /// Area type of the top surface.
    #[inline]
    pub fn area(&self) -> AreaType {
        self.area
    }

    #[inline]
    pub(crate) fn set_area(&mut self, area: impl Into<AreaType>) {
        self.area = area.into();
    }

    /// The next-higher span in the column.
    #[inline]
    pub fn next(&self) -> Option<SpanKey> {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: impl Into<Option<SpanKey>>) {
        self.next = next.into();
    }
}

/// The area id of a span, polygon or navmesh node.
///
/// Higher ids win when spans of different areas are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct AreaType(pub u8);

impl From<u8> for AreaType {
    fn from(value: u8) -> Self {
        AreaType(value)
    }
}

impl Deref for AreaType {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for AreaType {
    fn default() -> Self {
        Self::NOT_WALKABLE
    }
}

impl AreaType {
    /// Area 0. Nothing can walk on it.
    pub const NOT_WALKABLE: Self = Self(0);
    /// Given to walkable triangles that carry no area of their own.
    pub const DEFAULT_WALKABLE: Self = Self(u8::MAX);

    /// Whether anything other than [`AreaType::NOT_WALKABLE`].
    #[inline]
    pub fn is_walkable(&self) -> bool {
        *self != Self::NOT_WALKABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_replace_every_field() {
        let mut spans = Spans::with_min_capacity(1);
        let above = spans.insert(
            SpanBuilder {
                min: 12,
                max: 14,
                area: AreaType::DEFAULT_WALKABLE,
                next: None,
            }
            .into(),
        );
        let mut span: Span = SpanBuilder {
            min: 2,
            max: 10,
            area: AreaType(4),
            next: None,
        }
        .into();
        span.set_min(1);
        span.set_max(4);
        span.set_area(3);
        span.set_next(above);
        assert_eq!((span.min(), span.max(), span.area()), (1, 4, AreaType(3)));
        assert_eq!(spans[span.next().unwrap()].min(), 12);
    }

    #[test]
    fn only_area_zero_is_unwalkable() {
        assert!(!AreaType::NOT_WALKABLE.is_walkable());
        assert!(!AreaType::default().is_walkable());
        assert!(AreaType(1).is_walkable());
        assert!(AreaType::DEFAULT_WALKABLE.is_walkable());
    }
}
