//! Capacity and format violations surfaced during placement and encoding.
//!
//! These carry enough context (offset, struct identity) to locate the
//! producer defect. Plain invariant violations — double placement, size
//! mismatches, out-of-order chains — panic instead; see the crate docs.

use geoarc_core::StructId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The archive outgrew the signed 32-bit pointer range.
    #[error("archive size {size} exceeds addressable pointer range")]
    ArchiveTooLarge { size: u64 },

    /// A relative pointer written at `pos` would not fit a signed 32-bit delta.
    #[error("pointer at {pos} to {target:?} has delta {delta} outside signed 32-bit range")]
    PointerOutOfRange {
        pos: u32,
        target: StructId,
        delta: i64,
    },

    /// More flag bits requested than the target's alignment keeps free.
    #[error(
        "{flag_bits} flag bits requested at {pos} but {target:?} is only \
         2^{align_log2}-aligned"
    )]
    FlagBitsExceedAlignment {
        pos: u32,
        target: StructId,
        flag_bits: u8,
        align_log2: u8,
    },

    /// An index Link's cell delta exceeds the encodable signed width.
    #[error("index link delta {delta} from cell {cell} exceeds {bits}-bit signed range")]
    LinkDeltaOverflow { cell: u32, delta: i32, bits: u8 },
}
