use std::ops::Deref;

/// The id of a region in a [`CompactHeightfield`](crate::CompactHeightfield).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct RegionId(pub u16);

impl Deref for RegionId {
    type Target = u16;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<u16> for RegionId {
    fn from(value: u16) -> Self {
        RegionId(value)
    }
}

impl RegionId {
    /// Spans that are not in any region, i.e. not walkable or culled.
    pub const NONE: Self = Self(0);

    /// The largest usable region id.
    pub const MAX: Self = Self(u16::MAX);

    /// Whether this is an actual region.
    #[inline]
    pub fn is_some(&self) -> bool {
        *self != Self::NONE
    }
}
