//! Cell encodings for the static hash table.
//!
//! A slot is two 4-byte cells. The low 2 bits of a chain cell are the type
//! tag; an all-zero cell is empty (which is why item references must be
//! non-zero). A Link occupies a cell pair: the first cell carries the item
//! reference, the second a 20-bit key sample plus a signed 12-bit cell
//! delta to the next entry in the chain.

use crate::error::LayoutError;

/// Bytes per cell.
pub const CELL_BYTES: u32 = 4;
/// Bytes per slot (two cells).
pub const SLOT_BYTES: u32 = 8;
/// Fixed page size the packer optimizes locality for.
pub const PAGE_BYTES: u32 = 4096;
/// Cells per page.
pub const PAGE_CELLS: u32 = PAGE_BYTES / CELL_BYTES;
/// Slots per page.
pub const PAGE_SLOTS: u32 = PAGE_BYTES / SLOT_BYTES;

/// Signed bit width of a Link's cell delta.
pub const LINK_DELTA_BITS: u8 = 12;
/// Bit width of a Link's inline key sample.
pub const KEY_SAMPLE_BITS: u8 = 20;

pub const TAG_MASK: u32 = 0b11;
pub const TAG_LINK: u32 = 0b00;
pub const TAG_JUMP: u32 = 0b10;
pub const TAG_TAIL: u32 = 0b11;

/// One 4-byte cell of the table, as a closed variant rather than raw bit
/// arithmetic, so encode/decode stays independently testable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    /// Terminal chain entry.
    Tail { item: u32 },
    /// First cell of a Link pair.
    Link { item: u32 },
    /// Second cell of a Link pair: key sample plus signed cell delta from
    /// the Link's first cell to the next entry.
    LinkNext { key_sample: u32, delta: i32 },
    /// Redirect to the cell `delta` cells away.
    Jump { delta: i32 },
    /// Pending redirect to spillover chain `spill`, rewritten to a real
    /// [`Cell::Jump`] at write time once the spillover struct is placed.
    SpillJump { spill: u32 },
}

/// Sign-extend the low `bits` bits of `raw`.
#[inline]
fn sign_extend(raw: u32, bits: u8) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

impl Cell {
    /// Encode to the on-disk 4-byte value.
    ///
    /// `cell` is the cell's own index, used only for error context. A
    /// [`Cell::SpillJump`] cannot be encoded; the builder resolves it to a
    /// real Jump first.
    pub fn encode(self, cell: u32) -> Result<u32, LayoutError> {
        match self {
            Cell::Empty => Ok(0),
            Cell::Tail { item } => {
                debug_assert!(item != 0 && item >> 30 == 0);
                Ok((item << 2) | TAG_TAIL)
            }
            Cell::Link { item } => {
                debug_assert!(item != 0 && item >> 30 == 0);
                Ok((item << 2) | TAG_LINK)
            }
            Cell::LinkNext { key_sample, delta } => {
                debug_assert!(key_sample >> KEY_SAMPLE_BITS == 0);
                let limit = 1i32 << (LINK_DELTA_BITS - 1);
                if delta >= limit || delta < -limit {
                    return Err(LayoutError::LinkDeltaOverflow {
                        cell,
                        delta,
                        bits: LINK_DELTA_BITS,
                    });
                }
                let mask = (1u32 << LINK_DELTA_BITS) - 1;
                Ok((key_sample << LINK_DELTA_BITS) | (delta as u32 & mask))
            }
            Cell::Jump { delta } => {
                let limit = 1i32 << 29;
                if delta >= limit || delta < -limit {
                    return Err(LayoutError::LinkDeltaOverflow {
                        cell,
                        delta,
                        bits: 30,
                    });
                }
                Ok(((delta << 2) as u32) | TAG_JUMP)
            }
            Cell::SpillJump { spill } => {
                panic!("spillover jump to chain {spill} encoded before resolution")
            }
        }
    }

    /// Decode a chain cell (the first cell of a slot or entry). The second
    /// cell of a Link pair is not self-describing; use
    /// [`decode_link_next`].
    pub fn decode_head(raw: u32) -> Cell {
        if raw == 0 {
            return Cell::Empty;
        }
        match raw & TAG_MASK {
            TAG_TAIL => Cell::Tail { item: raw >> 2 },
            TAG_JUMP => Cell::Jump {
                delta: (raw as i32) >> 2,
            },
            // 0b01 is reserved; fold it into Link like the reader does.
            _ => Cell::Link { item: raw >> 2 },
        }
    }

    /// Decode the second cell of a Link pair.
    pub fn decode_link_next(raw: u32) -> Cell {
        Cell::LinkNext {
            key_sample: raw >> LINK_DELTA_BITS,
            delta: sign_extend(raw & ((1 << LINK_DELTA_BITS) - 1), LINK_DELTA_BITS),
        }
    }
}
