use core::fmt;
use core::num::NonZeroU32;

/// Index of an element, node, pore or cluster, stored offset by one so that
/// `Option<Id>` needs no extra space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Largest representable 0-based index.
    pub const MAX_INDEX: u32 = u32::MAX - 1;

    /// Indices past `MAX_INDEX` saturate to it.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// `None` when `index` does not fit.
    pub fn try_from_usize(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .filter(|i| *i <= Self::MAX_INDEX)
            .map(Self::from_index)
    }

    /// Saturating conversion; builders reject element counts past
    /// `MAX_INDEX` up front, so ids they hand out never collide.
    pub fn from_usize(index: usize) -> Self {
        Self::try_from_usize(index).unwrap_or(Self::from_index(Self::MAX_INDEX))
    }

    /// 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    pub fn idx(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// `ElementId` counts nodes first, then pores; `NodeId` and `PoreId` index
/// within their own kind.
pub type ElementId = Id;
pub type NodeId = Id;
pub type PoreId = Id;
pub type ClusterId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    proptest::proptest! {
        #[test]
        fn id_round_trip_index(i in 0_u32..u32::MAX) {
            let id = Id::from_index(i);
            proptest::prop_assert_eq!(id.index(), i);
            proptest::prop_assert_eq!(Id::from_usize(i as usize), id);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }

    #[test]
    fn oversized_index_is_rejected_not_wrapped() {
        let last = Id::MAX_INDEX as usize;
        assert_eq!(Id::try_from_usize(last).map(Id::idx), Some(last));
        assert_eq!(Id::try_from_usize(last + 1), None);
        assert_eq!(Id::from_usize(last + 1).idx(), last);
        #[cfg(target_pointer_width = "64")]
        {
            // `as u32` would have wrapped this to index 0.
            let wrapped = (u32::MAX as usize) + 1;
            assert_eq!(Id::try_from_usize(wrapped), None);
            assert_ne!(Id::from_usize(wrapped), Id::from_index(0));
        }
    }

    #[test]
    fn ids_order_by_index() {
        assert!(Id::from_index(3) < Id::from_index(7));
    }
}
