//! Diagnostic statistics for a built index.
//!
//! Computed from the build pass purely for reporting; nothing here is
//! correctness-bearing.

use std::fmt;

use super::{SLOT_BYTES, Spillover};

/// Summary statistics for one built [`StructIndex`](super::StructIndex).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IndexStats {
    /// Items indexed.
    pub items: usize,
    /// Table capacity in slots.
    pub slot_count: u32,
    /// Slots holding at least one item.
    pub occupied_slots: usize,
    /// Fraction of occupied slots holding more than one item.
    pub collision_ratio: f64,
    /// Fraction of occupied slots whose chain starts with a Jump.
    pub jump_ratio: f64,
    /// Deepest collision chain.
    pub longest_chain: usize,
    /// Items per occupied slot.
    pub average_chain: f64,
    /// Chains spilled out of the table.
    pub spillover_chains: usize,
    /// Table bytes plus spillover bytes.
    pub total_size: u64,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "items:          {}", self.items)?;
        writeln!(f, "slots:          {} ({} occupied)", self.slot_count, self.occupied_slots)?;
        writeln!(f, "collisions:     {:.4}", self.collision_ratio)?;
        writeln!(f, "jumps:          {:.4}", self.jump_ratio)?;
        writeln!(
            f,
            "chains:         longest {}, average {:.2}",
            self.longest_chain, self.average_chain
        )?;
        writeln!(f, "spillovers:     {}", self.spillover_chains)?;
        write!(f, "total size:     {} bytes", self.total_size)
    }
}

/// Derive stats from the bucketed items and packing outcome.
pub(super) fn compute(
    items: usize,
    slot_count: u32,
    buckets: &[Vec<usize>],
    relocated: usize,
    spillovers: &[Spillover],
) -> IndexStats {
    let occupied = buckets.iter().filter(|b| !b.is_empty()).count();
    let colliding = buckets.iter().filter(|b| b.len() > 1).count();
    let longest = buckets.iter().map(|b| b.len()).max().unwrap_or(0);
    let jumping = relocated + spillovers.len();

    let ratio = |n: usize| {
        if occupied == 0 {
            0.0
        } else {
            n as f64 / occupied as f64
        }
    };

    IndexStats {
        items,
        slot_count,
        occupied_slots: occupied,
        collision_ratio: ratio(colliding),
        jump_ratio: ratio(jumping),
        longest_chain: longest,
        average_chain: ratio(items),
        spillover_chains: spillovers.len(),
        total_size: slot_count as u64 * SLOT_BYTES as u64
            + spillovers.iter().map(|s| s.size() as u64).sum::<u64>(),
    }
}
