#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for geoarc archive construction.
//!
//! An archive is a graph of variable-sized, variably-aligned records
//! ("structs") referencing each other via relative offsets. This crate
//! holds the pre-placement layer:
//! - **Arena** (`StructPool`/`StructId`): size, alignment, anchor and
//!   placement state per struct, plus `next`-linked sibling chains and
//!   composite groups
//! - **Deduplication** (`SharedTable`): producer-owned content → canonical
//!   struct mapping
//!
//! Placement, pointer encoding and indexing live in `geoarc-archive`.

mod arena;
mod dedup;

#[cfg(test)]
mod arena_tests;

pub use arena::{Chain, StructId, StructPool, align_up};
pub use dedup::SharedTable;
