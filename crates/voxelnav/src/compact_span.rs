use crate::region::RegionId;

/// An open span of a [`CompactHeightfield`](crate::CompactHeightfield): the gap above a walkable surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactSpan {
    /// The floor of the gap, in cell heights above the heightfield's base.
    pub y: u16,
    /// The id of the region the span belongs to. (Or [`RegionId::NONE`] if not in a region.)
    pub region: RegionId,
    /// The clearance above the floor, saturated at `u8::MAX`.
    pub height: u8,
    /// Layer index of the linked span in the neighboring column, per direction.
    links: [u8; 4],
}

impl Default for CompactSpan {
    fn default() -> Self {
        Self {
            y: 0,
            region: RegionId::NONE,
            height: 0,
            links: [Self::NOT_CONNECTED; 4],
        }
    }
}

impl CompactSpan {
    pub(crate) const NOT_CONNECTED: u8 = u8::MAX;

    /// An unlinked span outside of any region.
    pub(crate) fn new(y: u16, height: u8) -> Self {
        Self {
            y,
            height,
            ..Default::default()
        }
    }

    /// Links the span to layer `neighbor` of the column in direction `direction`, or unlinks it.
    #[inline]
    pub(crate) fn set_con(&mut self, direction: u8, neighbor: Option<u8>) {
        self.links[direction as usize & 3] = neighbor.unwrap_or(Self::NOT_CONNECTED);
    }

    /// The layer of the neighboring column in direction `direction` this span is linked to.
    #[inline]
    pub fn con(&self, direction: u8) -> Option<u8> {
        let link = self.links[direction as usize & 3];
        (link != Self::NOT_CONNECTED).then_some(link)
    }

    /// The directions this span is linked in.
    pub fn linked_directions(&self) -> impl Iterator<Item = u8> + '_ {
        (0..4).filter(|dir| self.con(*dir).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_spans_are_unlinked() {
        assert_eq!(CompactSpan::default().linked_directions().count(), 0);
        let span = CompactSpan::new(7, 3);
        assert_eq!((span.y, span.height, span.region), (7, 3, RegionId::NONE));
        assert_eq!(span.linked_directions().count(), 0);
    }

    #[test]
    fn links_are_independent_per_direction() {
        let mut span = CompactSpan::default();
        span.set_con(0, Some(1));
        span.set_con(2, Some(0));
        span.set_con(3, Some(7));
        span.set_con(3, None);
        assert_eq!(span.con(0), Some(1));
        assert_eq!(span.con(1), None);
        assert_eq!(span.con(2), Some(0));
        assert_eq!(span.con(3), None);
        assert_eq!(span.linked_directions().collect::<Vec<_>>(), vec![0, 2]);
    }
}
