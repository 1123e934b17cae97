//! Locality-optimized static hash index.
//!
//! Builds a read-only hash table over a fixed item collection so that a
//! memory-mapped lookup touches as few fixed-size pages as possible. The
//! table is itself a struct: it is registered in the pool at build time,
//! placed like any other struct, and serialized through the
//! [`StructWriter`].
//!
//! Packing runs in three phases after trivial slots are settled:
//! 1. keep each collision chain inside the page of its home slot,
//!    nearest free cells first, longest chains first
//! 2. relocate whole chains that did not fit to any page with a long
//!    enough contiguous free run, reached via a Jump from the home slot
//! 3. spill the rest into out-of-band structs placed elsewhere in the
//!    archive, reached via a Jump resolved at write time

mod cell;
mod stats;


pub use cell::{
    CELL_BYTES, Cell, KEY_SAMPLE_BITS, LINK_DELTA_BITS, PAGE_BYTES, PAGE_CELLS, PAGE_SLOTS,
    SLOT_BYTES, TAG_JUMP, TAG_LINK, TAG_MASK, TAG_TAIL,
};
pub use stats::IndexStats;

use geoarc_core::{StructId, StructPool};

use crate::error::LayoutError;
use crate::writer::StructWriter;

/// One item to index: its full hash, a non-zero item reference that fits
/// 30 bits, and a key sample (low bits of the key) for miss
/// short-circuiting.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub hash: u64,
    pub item: u32,
    pub key_sample: u32,
}

/// Fold a 64-bit hash to 32 bits by XOR-ing its halves.
#[inline]
pub fn fold_hash(hash: u64) -> u32 {
    ((hash >> 32) ^ hash) as u32
}

/// Home slot for a hash: always non-negative.
#[inline]
pub fn slot_of(hash: u64, slot_count: u32) -> u32 {
    (fold_hash(hash) & 0x7fff_ffff) % slot_count
}

/// Item count rounded up to a whole number of pages of slots.
pub fn slot_count_for(items: usize) -> u32 {
    (items.max(1) as u32).div_ceil(PAGE_SLOTS) * PAGE_SLOTS
}

/// An overflow collision chain stored as an independent struct outside the
/// main table.
#[derive(Debug)]
pub struct Spillover {
    id: StructId,
    cells: Vec<Cell>,
}

impl Spillover {
    /// The out-of-band struct holding this chain; the producer places it
    /// like any other struct.
    pub fn id(&self) -> StructId {
        self.id
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> u32 {
        self.cells.len() as u32 * CELL_BYTES
    }
}

/// A built, immutable hash index awaiting placement and serialization.
#[derive(Debug)]
pub struct StructIndex {
    id: StructId,
    slot_count: u32,
    cells: Vec<Cell>,
    spillovers: Vec<Spillover>,
    stats: IndexStats,
}

impl StructIndex {
    /// Build the index over a fixed, order-stable collection.
    ///
    /// Registers the table struct and any spillover structs in `pool`;
    /// the caller must place all of them before writing.
    ///
    /// # Panics
    /// Panics if `slot_count` is zero, or an entry's item reference is
    /// zero or exceeds 30 bits, or a key sample exceeds 20 bits.
    pub fn build(
        pool: &mut StructPool,
        entries: &[IndexEntry],
        slot_count: u32,
    ) -> Result<StructIndex, LayoutError> {
        assert!(slot_count > 0, "index needs at least one slot");

        let total_cells = (slot_count * 2) as usize;
        let mut builder = Builder {
            cells: vec![Cell::Empty; total_cells],
            used: vec![false; total_cells],
            spillovers: Vec::new(),
        };

        // Bucket items into home-slot collision chains, input order kept.
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); slot_count as usize];
        for (i, entry) in entries.iter().enumerate() {
            assert!(
                entry.item != 0 && entry.item >> 30 == 0,
                "item reference {:#x} must be non-zero and fit 30 bits",
                entry.item
            );
            assert!(
                entry.key_sample >> KEY_SAMPLE_BITS == 0,
                "key sample {:#x} exceeds {KEY_SAMPLE_BITS} bits",
                entry.key_sample
            );
            buckets[slot_of(entry.hash, slot_count) as usize].push(i);
        }

        // Trivial slots commit immediately; colliding slots pre-reserve
        // their home pair so chain packing cannot steal it.
        let mut colliding: Vec<usize> = Vec::new();
        for (slot, bucket) in buckets.iter().enumerate() {
            let home = slot * 2;
            match bucket.len() {
                0 => {}
                1 => {
                    builder.cells[home] = Cell::Tail {
                        item: entries[bucket[0]].item,
                    };
                    builder.used[home] = true;
                }
                _ => {
                    builder.used[home] = true;
                    builder.used[home + 1] = true;
                    colliding.push(slot);
                }
            }
        }
        colliding.sort_by_key(|&slot| (std::cmp::Reverse(buckets[slot].len()), slot));

        // Phase 1: pack each chain inside its home page.
        let mut homeless: Vec<usize> = Vec::new();
        for &slot in &colliding {
            if !builder.place_in_home_page(slot, &buckets[slot], entries)? {
                homeless.push(slot);
            }
        }

        // Phase 2: relocate whole chains to any page with room; phase 3:
        // spill what remains. `homeless` is still longest-first.
        let mut relocated = 0usize;
        for &slot in &homeless {
            if builder.relocate(slot, &buckets[slot], entries)? {
                relocated += 1;
            } else {
                builder.spill(pool, slot, &buckets[slot], entries);
            }
        }

        let id = pool.add(slot_count * SLOT_BYTES, 2);
        let stats = stats::compute(
            entries.len(),
            slot_count,
            &buckets,
            relocated,
            &builder.spillovers,
        );
        Ok(StructIndex {
            id,
            slot_count,
            cells: builder.cells,
            spillovers: builder.spillovers,
            stats,
        })
    }

    /// The table struct; place it like any other struct.
    pub fn id(&self) -> StructId {
        self.id
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// Overflow chains to place alongside the table.
    pub fn spillovers(&self) -> &[Spillover] {
        &self.spillovers
    }

    /// Diagnostic statistics; not correctness-bearing.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Serialize the table and its spillover chains at their committed
    /// locations, resolving pending spillover jumps.
    pub fn write(&self, out: &mut StructWriter<'_>) -> Result<(), LayoutError> {
        let table_loc = out.pool().location(self.id);

        out.begin(self.id);
        for (i, &cell) in self.cells.iter().enumerate() {
            let cell_index = i as u32;
            let raw = match cell {
                Cell::SpillJump { spill } => {
                    let spill_loc = out.pool().location(self.spillovers[spill as usize].id);
                    let cell_loc = table_loc + cell_index * CELL_BYTES;
                    let delta = (spill_loc as i64 - cell_loc as i64) / CELL_BYTES as i64;
                    Cell::Jump {
                        delta: delta as i32,
                    }
                    .encode(cell_index)?
                }
                cell => cell.encode(cell_index)?,
            };
            out.write_u32(raw);
        }
        out.end();

        for spillover in &self.spillovers {
            out.begin(spillover.id);
            for (i, &cell) in spillover.cells.iter().enumerate() {
                out.write_u32(cell.encode(i as u32)?);
            }
            out.end();
        }
        Ok(())
    }
}

/// Mutable packing state during `build`.
struct Builder {
    cells: Vec<Cell>,
    used: Vec<bool>,
    spillovers: Vec<Spillover>,
}

impl Builder {
    fn page_bounds(&self, cell: usize) -> (usize, usize) {
        let start = cell / PAGE_CELLS as usize * PAGE_CELLS as usize;
        let end = (start + PAGE_CELLS as usize).min(self.cells.len());
        (start, end)
    }

    /// Try to place the whole chain within the home slot's page. On
    /// failure every cell taken during the attempt is released and the
    /// home slot keeps only its first cell (for the eventual Jump).
    fn place_in_home_page(
        &mut self,
        slot: usize,
        bucket: &[usize],
        entries: &[IndexEntry],
    ) -> Result<bool, LayoutError> {
        let home = slot * 2;
        let (page_start, page_end) = self.page_bounds(home);
        let n = bucket.len();

        let mut positions = vec![home];
        let mut taken: Vec<usize> = Vec::new();
        let mut prev = home;
        for i in 1..n {
            let needs_pair = i < n - 1;
            match self.nearest_free(prev, page_start, page_end, needs_pair) {
                Some(cell) => {
                    self.used[cell] = true;
                    taken.push(cell);
                    if needs_pair {
                        self.used[cell + 1] = true;
                        taken.push(cell + 1);
                    }
                    positions.push(cell);
                    prev = cell;
                }
                None => {
                    for cell in taken {
                        self.used[cell] = false;
                    }
                    self.used[home + 1] = false;
                    return Ok(false);
                }
            }
        }

        self.emit_chain(&positions, bucket, entries)?;
        Ok(true)
    }

    /// Place a whole chain densely into the first page with a long enough
    /// contiguous free run, jumping to it from the home slot.
    fn relocate(
        &mut self,
        slot: usize,
        bucket: &[usize],
        entries: &[IndexEntry],
    ) -> Result<bool, LayoutError> {
        let n = bucket.len();
        let run = 2 * n - 1;
        let Some(start) = self.find_free_run(run) else {
            return Ok(false);
        };

        let positions: Vec<usize> = (0..n).map(|i| start + 2 * i).collect();
        for cell in start..start + run {
            self.used[cell] = true;
        }
        self.emit_chain(&positions, bucket, entries)?;

        let home = slot * 2;
        self.cells[home] = Cell::Jump {
            delta: start as i32 - home as i32,
        };
        Ok(true)
    }

    /// Store a chain out-of-band; the home cell remembers the spillover's
    /// list index until the spillover struct is placed.
    fn spill(&mut self, pool: &mut StructPool, slot: usize, bucket: &[usize], entries: &[IndexEntry]) {
        let n = bucket.len();
        let mut cells = Vec::with_capacity(2 * n - 1);
        for (i, &entry_index) in bucket.iter().enumerate() {
            let entry = entries[entry_index];
            if i < n - 1 {
                cells.push(Cell::Link { item: entry.item });
                cells.push(Cell::LinkNext {
                    key_sample: entry.key_sample,
                    delta: 2,
                });
            } else {
                cells.push(Cell::Tail { item: entry.item });
            }
        }

        let id = pool.add(cells.len() as u32 * CELL_BYTES, 2);
        self.cells[slot * 2] = Cell::SpillJump {
            spill: self.spillovers.len() as u32,
        };
        self.spillovers.push(Spillover { id, cells });
    }

    /// Fill `cells` for a chain laid out at `positions` (one head cell per
    /// entry). Link deltas must fit the fixed signed width; overflow is a
    /// construction error, never a truncation.
    fn emit_chain(
        &mut self,
        positions: &[usize],
        bucket: &[usize],
        entries: &[IndexEntry],
    ) -> Result<(), LayoutError> {
        let n = bucket.len();
        for i in 0..n {
            let pos = positions[i];
            let entry = entries[bucket[i]];
            if i == n - 1 {
                self.cells[pos] = Cell::Tail { item: entry.item };
            } else {
                let delta = positions[i + 1] as i64 - pos as i64;
                let limit = 1i64 << (LINK_DELTA_BITS - 1);
                if delta >= limit || delta < -limit {
                    return Err(LayoutError::LinkDeltaOverflow {
                        cell: pos as u32,
                        delta: delta as i32,
                        bits: LINK_DELTA_BITS,
                    });
                }
                self.cells[pos] = Cell::Link { item: entry.item };
                self.cells[pos + 1] = Cell::LinkNext {
                    key_sample: entry.key_sample,
                    delta: delta as i32,
                };
            }
        }
        Ok(())
    }

    /// Nearest free cell (pair) to `prev` within the page, scanning
    /// outward by cell-index distance, forward before backward.
    fn nearest_free(
        &self,
        prev: usize,
        page_start: usize,
        page_end: usize,
        needs_pair: bool,
    ) -> Option<usize> {
        let fits = |cell: usize| -> bool {
            if cell < page_start || cell >= page_end || self.used[cell] {
                return false;
            }
            !needs_pair || (cell + 1 < page_end && !self.used[cell + 1])
        };

        for distance in 1..page_end - page_start {
            let forward = prev + distance;
            if forward < page_end && fits(forward) {
                return Some(forward);
            }
            if let Some(backward) = prev.checked_sub(distance)
                && fits(backward)
            {
                return Some(backward);
            }
        }
        None
    }

    /// First contiguous free run of `run` cells lying entirely in one page.
    fn find_free_run(&self, run: usize) -> Option<usize> {
        if run > PAGE_CELLS as usize {
            return None;
        }
        let total = self.cells.len();
        let mut page_start = 0;
        while page_start < total {
            let page_end = (page_start + PAGE_CELLS as usize).min(total);
            let mut free = 0;
            for cell in page_start..page_end {
                if self.used[cell] {
                    free = 0;
                } else {
                    free += 1;
                    if free == run {
                        return Some(cell + 1 - run);
                    }
                }
            }
            page_start = page_end;
        }
        None
    }
}

/// Result of following one slot's chain in a serialized archive.
#[derive(Debug, Default)]
pub struct Probe {
    /// Item references seen along the chain, in traversal order.
    pub items: Vec<u32>,
    /// Jump cells followed.
    pub jumps: u32,
    /// Cells visited.
    pub steps: u32,
}

/// Reference reader: follow the chain for `hash` in a serialized archive.
///
/// Readers validate pointer ranges against the archive bounds before
/// trusting them; this helper is the behavioral contract the build must
/// satisfy and is what the tests probe with.
pub fn probe(buf: &[u8], table_loc: u32, slot_count: u32, hash: u64) -> Probe {
    let slot = slot_of(hash, slot_count);
    let mut pos = (table_loc + slot * SLOT_BYTES) as i64;
    let mut out = Probe::default();

    // A correct table terminates; cap traversal so corrupt input cannot
    // loop. No chain can visit more cells than the archive holds.
    while (out.steps as usize) <= buf.len() / CELL_BYTES as usize {
        out.steps += 1;
        let raw = read_u32_le(buf, pos as usize);
        match Cell::decode_head(raw) {
            Cell::Empty => break,
            Cell::Tail { item } => {
                out.items.push(item);
                break;
            }
            Cell::Jump { delta } => {
                out.jumps += 1;
                pos += delta as i64 * CELL_BYTES as i64;
            }
            Cell::Link { item } => {
                out.items.push(item);
                let Cell::LinkNext { delta, .. } = Cell::decode_link_next(read_u32_le(buf, pos as usize + 4))
                else {
                    unreachable!()
                };
                pos += delta as i64 * CELL_BYTES as i64;
            }
            Cell::LinkNext { .. } | Cell::SpillJump { .. } => unreachable!(),
        }
    }
    out
}

#[inline]
fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
