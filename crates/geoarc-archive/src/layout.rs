//! Bounded local placement for a short ordered child sequence.
//!
//! A simpler, scoped variant of the [`Placer`](crate::Placer): children of
//! one parent container are linearized mostly in arrival order, but a
//! later, better-fitting struct may overtake an earlier one by at most
//! `max_drift` bytes to avoid padding. There is no per-class queue and no
//! unbounded lookahead; just a small deferred FIFO.

use std::collections::VecDeque;

use geoarc_core::{StructId, StructPool};

use crate::Archive;
use crate::error::LayoutError;

/// A struct held back until the cursor suits its alignment.
#[derive(Debug, Clone, Copy)]
struct Deferred {
    id: StructId,
    /// Cursor position when the struct was deferred; the drift budget is
    /// measured from here.
    tentative: u32,
}

/// In-order placement with a bounded amount of out-of-order drift.
#[derive(Debug)]
pub struct StructLayout {
    max_drift: u32,
    deferred: VecDeque<Deferred>,
}

impl StructLayout {
    pub fn new(max_drift: u32) -> Self {
        Self {
            max_drift,
            deferred: VecDeque::new(),
        }
    }

    /// Number of structs currently deferred.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Commit `id` at the cursor unconditionally, padding as needed.
    pub fn put(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
        id: StructId,
    ) -> Result<u32, LayoutError> {
        archive.place(pool, id)
    }

    /// Feed the next child in arrival order.
    ///
    /// With `max_drift == 0` this is exactly [`put`](Self::put). Otherwise
    /// a non-fitting struct is deferred, and a fitting one commits only
    /// while that stays within the drift budget of the earliest deferred
    /// struct; past the budget the oldest deferred struct is forced out
    /// first, paying its padding.
    pub fn place(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
        id: StructId,
    ) -> Result<(), LayoutError> {
        if self.max_drift == 0 {
            self.put(archive, pool, id)?;
            return Ok(());
        }

        loop {
            let cursor = archive.size();
            if pool.aligned_location(id, cursor) != cursor {
                pool.mark_queued(id);
                self.deferred.push_back(Deferred {
                    id,
                    tentative: cursor,
                });
                return Ok(());
            }

            let within_budget = match self.deferred.front() {
                None => true,
                Some(front) => cursor + pool.size(id) <= front.tentative + self.max_drift,
            };
            if within_budget {
                archive.place(pool, id)?;
                self.drain_fits(archive, pool)?;
                return Ok(());
            }

            // Oldest deferred struct has waited long enough; pay its padding.
            let front = self.deferred.pop_front().expect("budget check saw a front");
            archive.place(pool, front.id)?;
            self.drain_fits(archive, pool)?;
        }
    }

    /// Commit remaining deferred structs in arrival order.
    pub fn flush(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
    ) -> Result<(), LayoutError> {
        while let Some(deferred) = self.deferred.pop_front() {
            archive.place(pool, deferred.id)?;
            self.drain_fits(archive, pool)?;
        }
        Ok(())
    }

    /// Drain deferred structs that now fit the cursor with zero padding,
    /// earliest-arrival first. Each struct is drained at most once.
    fn drain_fits(
        &mut self,
        archive: &mut Archive,
        pool: &mut StructPool,
    ) -> Result<(), LayoutError> {
        loop {
            let cursor = archive.size();
            let hit = self
                .deferred
                .iter()
                .position(|d| pool.aligned_location(d.id, cursor) == cursor);
            match hit {
                Some(i) => {
                    let deferred = self.deferred.remove(i).expect("position was in range");
                    archive.place(pool, deferred.id)?;
                }
                None => return Ok(()),
            }
        }
    }
}
