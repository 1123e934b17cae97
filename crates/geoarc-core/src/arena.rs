//! Arena-backed struct metadata.
//!
//! Every serializable record in an archive is described by a [`StructMeta`]
//! entry inside a [`StructPool`] and addressed by a stable [`StructId`].
//! Identity is an arena index, never a memory address: a struct's byte
//! location exists only after placement, and all pointer math goes through
//! the pool.
//!
//! Placement is one-way: Unplaced → Queued → Placed. Violating that order
//! is a producer bug and panics.

/// A lightweight handle to a struct in a [`StructPool`].
///
/// Comparing two ids is O(1). Ids are ordered by creation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize)]
pub struct StructId(u32);

impl StructId {
    /// Raw index for diagnostics/serialization.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create a StructId from a raw index. Use only for deserialization.
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// Placement lifecycle of a struct. Transitions are one-way.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum PlaceState {
    Unplaced,
    Queued,
    Placed(u32),
}

/// Metadata for one struct: extent, alignment, anchor, placement state and
/// the sibling chain link.
#[derive(Clone, Debug)]
struct StructMeta {
    size: u32,
    align_log2: u8,
    /// Offset of the pointer-relative base within the struct. Non-zero when
    /// a variable-length prefix precedes the fixed-position core.
    anchor: u32,
    state: PlaceState,
    next: Option<StructId>,
    /// First child of a composite group, None for plain structs.
    first_child: Option<StructId>,
}

/// Round `pos` up to the next multiple of `2^align_log2`.
#[inline]
pub fn align_up(pos: u32, align_log2: u8) -> u32 {
    let mask = (1u32 << align_log2) - 1;
    (pos + mask) & !mask
}

/// Arena of struct metadata for one archive under construction.
#[derive(Debug, Default)]
pub struct StructPool {
    entries: Vec<StructMeta>,
}

impl StructPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct with its extent and alignment fixed up front.
    pub fn add(&mut self, size: u32, align_log2: u8) -> StructId {
        let id = StructId(self.entries.len() as u32);
        self.entries.push(StructMeta {
            size,
            align_log2,
            anchor: 0,
            state: PlaceState::Unplaced,
            next: None,
            first_child: None,
        });
        id
    }

    /// Register a composite group over already-registered children.
    ///
    /// The group's size is the sum of aligned child extents and its
    /// alignment is the first child's, so the parent can treat the group as
    /// one opaque struct. Children are chained via `next` in the given
    /// order; committing the group commits every child.
    ///
    /// # Panics
    /// Panics if `children` is empty or any child is not Unplaced.
    pub fn add_group(&mut self, children: &[StructId]) -> StructId {
        assert!(!children.is_empty(), "group must have at least one child");

        let align_log2 = self.align_log2(children[0]);
        let mut extent = 0u32;
        for &child in children {
            assert_eq!(
                self.meta(child).state,
                PlaceState::Unplaced,
                "group child {child:?} already queued or placed"
            );
            extent = align_up(extent, self.align_log2(child));
            extent += self.size(child);
        }
        for pair in children.windows(2) {
            self.set_next(pair[0], Some(pair[1]));
        }

        let id = self.add(extent, align_log2);
        self.entries[id.0 as usize].first_child = Some(children[0]);
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn meta(&self, id: StructId) -> &StructMeta {
        &self.entries[id.0 as usize]
    }

    #[inline]
    fn meta_mut(&mut self, id: StructId) -> &mut StructMeta {
        &mut self.entries[id.0 as usize]
    }

    #[inline]
    pub fn size(&self, id: StructId) -> u32 {
        self.meta(id).size
    }

    #[inline]
    pub fn align_log2(&self, id: StructId) -> u8 {
        self.meta(id).align_log2
    }

    #[inline]
    pub fn anchor(&self, id: StructId) -> u32 {
        self.meta(id).anchor
    }

    #[inline]
    pub fn next(&self, id: StructId) -> Option<StructId> {
        self.meta(id).next
    }

    /// Update the extent. Valid only before the struct is queued or placed.
    pub fn set_size(&mut self, id: StructId, size: u32) {
        self.ensure_unplaced(id, "set_size");
        self.meta_mut(id).size = size;
    }

    /// Update the alignment. Valid only before the struct is queued or placed.
    pub fn set_alignment(&mut self, id: StructId, align_log2: u8) {
        self.ensure_unplaced(id, "set_alignment");
        self.meta_mut(id).align_log2 = align_log2;
    }

    /// Set the pointer-relative base offset within the struct.
    pub fn set_anchor(&mut self, id: StructId, anchor: u32) {
        self.ensure_unplaced(id, "set_anchor");
        self.meta_mut(id).anchor = anchor;
    }

    /// Link `id` to the following struct in its sibling chain.
    pub fn set_next(&mut self, id: StructId, next: Option<StructId>) {
        self.meta_mut(id).next = next;
    }

    /// Smallest offset `>= pos` satisfying the struct's alignment.
    /// Pure: depends only on `pos` and the stored alignment.
    #[inline]
    pub fn aligned_location(&self, id: StructId, pos: u32) -> u32 {
        align_up(pos, self.meta(id).align_log2)
    }

    #[inline]
    pub fn is_placed(&self, id: StructId) -> bool {
        matches!(self.meta(id).state, PlaceState::Placed(_))
    }

    #[inline]
    pub fn is_queued(&self, id: StructId) -> bool {
        self.meta(id).state == PlaceState::Queued
    }

    /// Committed byte offset, if any.
    #[inline]
    pub fn try_location(&self, id: StructId) -> Option<u32> {
        match self.meta(id).state {
            PlaceState::Placed(loc) => Some(loc),
            _ => None,
        }
    }

    /// Committed byte offset.
    ///
    /// # Panics
    /// Panics if the struct has not been placed; reading a location before
    /// commit would silently corrupt every pointer derived from it.
    #[inline]
    pub fn location(&self, id: StructId) -> u32 {
        match self.meta(id).state {
            PlaceState::Placed(loc) => loc,
            state => panic!("location of {id:?} read before placement (state {state:?})"),
        }
    }

    /// Pointer-relative base: `location + anchor`.
    #[inline]
    pub fn anchor_location(&self, id: StructId) -> u32 {
        self.location(id) + self.meta(id).anchor
    }

    /// Transition Unplaced → Queued. A struct may be queued exactly once.
    pub fn mark_queued(&mut self, id: StructId) {
        let meta = self.meta_mut(id);
        assert_eq!(
            meta.state,
            PlaceState::Unplaced,
            "{id:?} queued twice or queued after placement"
        );
        meta.state = PlaceState::Queued;
    }

    /// Fix the struct's byte offset. Irreversible; a second commit panics.
    ///
    /// Committing a group also commits its chained children at their
    /// aligned offsets within the group extent.
    pub fn commit(&mut self, id: StructId, location: u32) {
        let meta = self.meta_mut(id);
        if let PlaceState::Placed(prev) = meta.state {
            panic!("{id:?} placed twice (at {prev}, then {location})");
        }
        assert_eq!(
            location,
            align_up(location, meta.align_log2),
            "{id:?} committed at misaligned offset {location}"
        );
        meta.state = PlaceState::Placed(location);

        if let Some(first) = self.meta(id).first_child {
            let mut pos = location;
            let mut child = Some(first);
            while let Some(c) = child {
                pos = self.aligned_location(c, pos);
                self.commit(c, pos);
                pos += self.size(c);
                child = self.next(c);
            }
            let end = self.location(id) + self.size(id);
            assert!(
                pos <= end,
                "group {id:?} children overrun extent ({pos} > {end})"
            );
        }
    }

    /// Iterate a `next`-linked chain starting at `first`.
    pub fn chain(&self, first: StructId) -> Chain<'_> {
        Chain {
            pool: self,
            cursor: Some(first),
        }
    }

    fn ensure_unplaced(&self, id: StructId, op: &str) {
        assert_eq!(
            self.meta(id).state,
            PlaceState::Unplaced,
            "{op} on {id:?} after queueing or placement"
        );
    }
}

/// Iterator over a `next`-linked sibling chain.
pub struct Chain<'a> {
    pool: &'a StructPool,
    cursor: Option<StructId>,
}

impl Iterator for Chain<'_> {
    type Item = StructId;

    fn next(&mut self) -> Option<StructId> {
        let id = self.cursor?;
        self.cursor = self.pool.next(id);
        Some(id)
    }
}
