//! Padding-minimizing struct placement with bounded lookahead.
//!
//! Structs arrive in producer order but commit in an order chosen to keep
//! alignment padding low. One FIFO queue per alignment class buffers
//! structs whose alignment does not suit the current cursor; a small
//! precomputed table maps every cursor phase (position modulo the largest
//! alignment period) to the preferred drain order. Memory use is capped by
//! `max_queued` independent of input length.

use std::collections::VecDeque;

use geoarc_core::{StructId, StructPool, align_up};

use crate::Archive;
use crate::error::LayoutError;

/// Streaming placer for structs with alignment classes `0..=max_align`.
#[derive(Debug)]
pub struct Placer {
    max_align: u8,
    max_queued: usize,
    /// One FIFO per alignment class.
    queues: Vec<VecDeque<StructId>>,
    queued: usize,
    /// `table[phase]` lists every alignment class, ordered by the padding
    /// it would cost at that cursor phase (zero-padding classes first,
    /// most restrictive class breaking ties).
    table: Vec<Vec<u8>>,
}

impl Placer {
    /// Build a placer for alignment classes `0..=max_align`.
    ///
    /// # Panics
    /// Panics if `max_align > 8` or `max_queued < 2 * (max_align + 1)` —
    /// with fewer queue slots than classes the placer degenerates to
    /// in-order placement and the bound loses its meaning.
    pub fn new(max_align: u8, max_queued: usize) -> Self {
        assert!(max_align <= 8, "alignment class {max_align} out of range");
        assert!(
            max_queued >= 2 * (max_align as usize + 1),
            "max_queued {max_queued} too small for {} alignment classes",
            max_align + 1
        );

        let period = 1usize << max_align;
        let table = (0..period as u32)
            .map(|phase| {
                let mut classes: Vec<u8> = (0..=max_align).collect();
                classes.sort_by_key(|&c| (align_up(phase, c) - phase, std::cmp::Reverse(c)));
                classes
            })
            .collect();

        Self {
            max_align,
            max_queued,
            queues: vec![VecDeque::new(); max_align as usize + 1],
            queued: 0,
            table,
        }
    }

    /// Number of structs currently buffered.
    pub fn queued(&self) -> usize {
        self.queued
    }

    #[inline]
    fn phase(&self, archive: &Archive) -> usize {
        archive.size() as usize & ((1 << self.max_align) - 1)
    }

    /// Feed one struct. It commits now or is buffered for a later, cheaper
    /// position; either way it is owned by the placer until committed.
    pub fn place(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
        id: StructId,
    ) -> Result<(), LayoutError> {
        let class = pool.align_log2(id);
        assert!(
            class <= self.max_align,
            "struct {id:?} alignment class {class} exceeds placer max {}",
            self.max_align
        );

        let phase = self.phase(archive);
        let ideal = self.table[phase][0];
        if class == ideal {
            archive.place(pool, id)?;
            self.drain_fits(archive, pool)?;
            return Ok(());
        }

        // Half-full queue: settle for any zero-padding position rather
        // than buffering further.
        let cursor = archive.size();
        let fits = pool.aligned_location(id, cursor) == cursor;
        if fits && self.queued * 2 >= self.max_queued {
            archive.place(pool, id)?;
            self.drain_fits(archive, pool)?;
            return Ok(());
        }

        pool.mark_queued(id);
        self.queues[class as usize].push_back(id);
        self.queued += 1;

        if self.queued >= self.max_queued {
            self.force_drain_one(archive, pool)?;
            self.drain_fits(archive, pool)?;
        }
        Ok(())
    }

    /// Commit all buffered structs in best-fit order. Call once input is
    /// exhausted.
    pub fn flush(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
    ) -> Result<(), LayoutError> {
        while self.queued > 0 {
            self.force_drain_one(archive, pool)?;
            self.drain_fits(archive, pool)?;
        }
        Ok(())
    }

    /// Commit queued structs for as long as some class fits the cursor
    /// with zero padding.
    fn drain_fits(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
    ) -> Result<(), LayoutError> {
        loop {
            let phase = self.phase(archive);
            let mut progressed = false;
            for &class in &self.table[phase] {
                if align_up(phase as u32, class) != phase as u32 {
                    // Classes are ordered by padding cost; the rest would pad.
                    break;
                }
                if let Some(id) = self.queues[class as usize].pop_front() {
                    self.queued -= 1;
                    archive.place(pool, id)?;
                    progressed = true;
                    break;
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    /// Commit one queued struct, taking the cheapest non-empty class at
    /// the current cursor phase.
    fn force_drain_one(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
    ) -> Result<(), LayoutError> {
        let phase = self.phase(archive);
        for &class in &self.table[phase] {
            if let Some(id) = self.queues[class as usize].pop_front() {
                self.queued -= 1;
                archive.place(pool, id)?;
                return Ok(());
            }
        }
        unreachable!("force drain with no queued structs");
    }
}
