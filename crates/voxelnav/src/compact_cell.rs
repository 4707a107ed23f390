/// A column of a [`CompactHeightfield`](crate::CompactHeightfield): a contiguous run of its spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactCell {
    first: u32,
    len: u8,
}

impl CompactCell {
    /// Position of the column's lowest span in [`CompactHeightfield::spans`](crate::CompactHeightfield::spans).
    #[inline]
    pub fn index(&self) -> u32 {
        self.first
    }

    /// How many open spans the column holds.
    #[inline]
    pub fn count(&self) -> u8 {
        self.len
    }

    /// The span indices of the column.
    #[inline]
    pub fn span_range(&self) -> std::ops::Range<usize> {
        let first = self.first as usize;
        first..first + self.len as usize
    }

    #[inline]
    pub(crate) fn set_index(&mut self, index: u32) {
        self.first = index;
    }

    #[inline]
    pub(crate) fn inc_count(&mut self) {
        self.len += 1;
    }
}
