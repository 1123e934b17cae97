//! Append cursor for one archive under construction.
//!
//! The archive owns the total committed size. Committing a struct fixes
//! its location at the aligned cursor and advances the cursor; the struct
//! is never relocated afterwards. All placement strategies (direct `place`,
//! [`Placer`](crate::Placer), [`StructLayout`](crate::StructLayout)) funnel
//! through here, so padding accounting has a single source of truth.

use geoarc_core::{StructId, StructPool};

use crate::error::LayoutError;

/// Pointer range limit: relative offsets are signed 32-bit, so the archive
/// may never grow past this.
pub const MAX_ARCHIVE_SIZE: u64 = i32::MAX as u64;

/// Destination allocator tracking total committed size and padding.
#[derive(Debug, Default)]
pub struct Archive {
    cursor: u32,
    padding: u32,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total committed size so far (the next unaligned write position).
    #[inline]
    pub fn size(&self) -> u32 {
        self.cursor
    }

    /// Total alignment padding emitted so far.
    #[inline]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Commit `id` at the aligned cursor and advance past it.
    ///
    /// Returns the assigned location. Fails if the archive would outgrow
    /// the signed 32-bit pointer range; panics (via the pool) if `id` was
    /// already placed.
    pub fn place(&mut self, pool: &mut StructPool, id: StructId) -> Result<u32, LayoutError> {
        let location = pool.aligned_location(id, self.cursor);
        let end = location as u64 + pool.size(id) as u64;
        if end > MAX_ARCHIVE_SIZE {
            return Err(LayoutError::ArchiveTooLarge { size: end });
        }
        self.padding += location - self.cursor;
        pool.commit(id, location);
        self.cursor = end as u32;
        Ok(location)
    }
}
