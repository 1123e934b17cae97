//! Byte-level serialization of placed structs.
//!
//! The writer owns a cursor into the destination buffer (sized to the
//! final archive) and translates every outgoing struct reference into a
//! relative pointer. `begin`/`end` bracket each struct and enforce that
//! the bytes actually written match the declared size — a mismatch would
//! corrupt every subsequent offset, so it is a hard fault.
//!
//! All multi-byte fields are little-endian, written with the std
//! `to_le_bytes` helpers.

use geoarc_core::{StructId, StructPool};

use crate::error::LayoutError;

/// An unresolved cross-archive reference, emitted to a side stream for
/// later resolution once the target tile has been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LinkRecord {
    /// Writer position of the local pointer slot.
    pub pos: u32,
    /// Target tile id in the high 28 bits, shift in the low 4.
    pub tile_and_shift: u32,
    /// Target's logical id within its tile.
    pub target_id: u64,
    /// Flag bits the resolver must OR into the final pointer.
    pub flags: u32,
}

impl LinkRecord {
    /// Encoded size of one link record.
    pub const SIZE: usize = 20;

    /// Encode for the side link stream.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.pos.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.tile_and_shift.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.target_id.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }

    /// Decode one record from the side link stream.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            pos: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            tile_and_shift: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            target_id: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            flags: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
        }
    }
}

/// Byte cursor writing placed structs into the destination buffer.
pub struct StructWriter<'a> {
    pool: &'a StructPool,
    buf: &'a mut [u8],
    pos: u32,
    /// Declared end of the struct opened by `begin`, checked by `end`.
    expected_end: Option<(StructId, u32)>,
    links: Vec<LinkRecord>,
}

impl<'a> StructWriter<'a> {
    /// Wrap a destination buffer sized to the final archive. Placement
    /// must be finished; the writer only reads locations.
    pub fn new(pool: &'a StructPool, buf: &'a mut [u8]) -> Self {
        Self {
            pool,
            buf,
            pos: 0,
            expected_end: None,
            links: Vec::new(),
        }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Pool the writer resolves locations against.
    #[inline]
    pub fn pool(&self) -> &StructPool {
        self.pool
    }

    /// Foreign-link records accumulated so far.
    pub fn links(&self) -> &[LinkRecord] {
        &self.links
    }

    /// Hand the foreign-link records to the cross-tile resolver.
    pub fn take_links(&mut self) -> Vec<LinkRecord> {
        std::mem::take(&mut self.links)
    }

    /// Seek to the committed location of `id` and open it for writing.
    ///
    /// # Panics
    /// Panics if `id` is unplaced or another struct is still open.
    pub fn begin(&mut self, id: StructId) {
        assert!(
            self.expected_end.is_none(),
            "begin({id:?}) while {:?} is still open",
            self.expected_end.map(|(open, _)| open)
        );
        let location = self.pool.location(id);
        self.pos = location;
        self.expected_end = Some((id, location + self.pool.size(id)));
    }

    /// Close the struct opened by `begin`.
    ///
    /// # Panics
    /// Panics if the bytes written do not match the declared size; a
    /// mismatch corrupts every subsequent offset.
    pub fn end(&mut self) {
        let (id, end) = self.expected_end.take().expect("end without begin");
        assert_eq!(
            self.pos, end,
            "{id:?} declared end {end} but writer stopped at {}",
            self.pos
        );
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let start = self.pos as usize;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len() as u32;
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write a plain relative pointer: `target.anchor_location() - pos`.
    ///
    /// A `None` target writes a zero pointer; callers for whom null is
    /// unexpected must check before calling.
    pub fn write_pointer(&mut self, target: Option<StructId>) -> Result<(), LayoutError> {
        match target {
            None => {
                self.write_u32(0);
                Ok(())
            }
            Some(target) => {
                let delta = self.pointer_delta(target)?;
                self.write_i32(delta);
                Ok(())
            }
        }
    }

    /// Write a relative pointer with status bits OR'd into the low bits.
    ///
    /// Valid only when the target's alignment keeps those bits zero in the
    /// delta; this is a checked precondition, not an assumed contract.
    pub fn write_flagged_pointer(
        &mut self,
        target: StructId,
        flags: u32,
    ) -> Result<(), LayoutError> {
        let align_log2 = self.pool.align_log2(target);
        let flag_bits = (32 - flags.leading_zeros()) as u8;
        if flag_bits > align_log2 {
            return Err(LayoutError::FlagBitsExceedAlignment {
                pos: self.pos,
                target,
                flag_bits,
                align_log2,
            });
        }
        let delta = self.pointer_delta(target)?;
        self.write_u32(delta as u32 | flags);
        Ok(())
    }

    /// Write a tagged pointer carrying `flag_bits` flag bits.
    ///
    /// The delta is taken from the cursor masked down to a
    /// `2^(flag_bits-1)` boundary, shifted left by one and OR'd with the
    /// flags, so the low `flag_bits` bits are free for them. Requires the
    /// target's alignment to cover `flag_bits - 1` bits.
    pub fn write_tagged_pointer(
        &mut self,
        target: StructId,
        flag_bits: u8,
        flags: u32,
    ) -> Result<(), LayoutError> {
        assert!(
            flag_bits >= 1 && flag_bits < 32,
            "tagged pointer needs 1..32 flag bits, got {flag_bits}"
        );
        assert!(
            flags >> flag_bits == 0,
            "flags {flags:#x} do not fit {flag_bits} bits"
        );
        let align_log2 = self.pool.align_log2(target);
        if align_log2 + 1 < flag_bits {
            return Err(LayoutError::FlagBitsExceedAlignment {
                pos: self.pos,
                target,
                flag_bits,
                align_log2,
            });
        }

        let base = self.pos & !((1u32 << (flag_bits - 1)) - 1);
        let delta = self.pool.anchor_location(target) as i64 - base as i64;
        let shifted = delta << 1;
        if shifted > i32::MAX as i64 || shifted < i32::MIN as i64 {
            return Err(LayoutError::PointerOutOfRange {
                pos: self.pos,
                target,
                delta,
            });
        }
        self.write_u32(shifted as i32 as u32 | flags);
        Ok(())
    }

    /// Write a pointer to a struct in another archive/tile.
    ///
    /// The local slot receives only the placeholder `flags`; the real
    /// offset is filled in by the cross-tile resolver from the side link
    /// stream once the target tile has been placed.
    pub fn write_foreign_pointer(&mut self, tile: u32, shift: u8, target_id: u64, flags: u32) {
        debug_assert!(tile >> 28 == 0, "tile id {tile:#x} does not fit 28 bits");
        debug_assert!(shift < 16, "shift {shift} does not fit 4 bits");
        self.links.push(LinkRecord {
            pos: self.pos,
            tile_and_shift: (tile << 4) | shift as u32,
            target_id,
            flags,
        });
        self.write_u32(flags);
    }

    /// Write every struct of a `next`-linked chain via `emit`, asserting
    /// strictly increasing locations. A chain discovered out of order is a
    /// placement bug upstream.
    pub fn write_chain(
        &mut self,
        first: StructId,
        mut emit: impl FnMut(&mut Self, StructId) -> Result<(), LayoutError>,
    ) -> Result<(), LayoutError> {
        let mut prev: Option<(StructId, u32)> = None;
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let location = self.pool.location(id);
            if let Some((prev_id, prev_loc)) = prev {
                assert!(
                    location > prev_loc,
                    "chain out of location order: {id:?} at {location} after {prev_id:?} at {prev_loc}"
                );
            }
            self.begin(id);
            emit(self, id)?;
            self.end();
            prev = Some((id, location));
            cursor = self.pool.next(id);
        }
        Ok(())
    }

    fn pointer_delta(&self, target: StructId) -> Result<i32, LayoutError> {
        let delta = self.pool.anchor_location(target) as i64 - self.pos as i64;
        i32::try_from(delta).map_err(|_| LayoutError::PointerOutOfRange {
            pos: self.pos,
            target,
            delta,
        })
    }
}
