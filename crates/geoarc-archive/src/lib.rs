#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Struct placement, pointer encoding and static hash indexing.
//!
//! This crate turns a graph of [`geoarc_core`] structs into one contiguous,
//! memory-mappable byte buffer:
//! - [`Archive`]: the append cursor; committing a struct fixes its offset
//! - [`Placer`]: padding-minimizing commit order with bounded lookahead
//! - [`StructLayout`]: scoped in-order placement with bounded drift
//! - [`StructWriter`]: byte-level serialization; relative, flagged, tagged
//!   and cross-tile ("foreign") pointer encodings
//! - [`index`]: page-locality-optimized static hash table, itself a struct
//!
//! Everything is single-threaded and synchronous; independent archives
//! (one per tile) parallelize by owning separate pools and cursors.
//!
//! # Errors and panics
//!
//! Capacity and format violations (archive outgrowing the signed 32-bit
//! pointer range, flag bits the target's alignment cannot carry, Link
//! deltas past their fixed width) are [`LayoutError`]s. Producer bugs —
//! double placement, writing more or fewer bytes than declared, chains out
//! of location order — panic immediately; tolerating them would corrupt
//! the archive.

mod archive;
mod error;
pub mod index;
mod layout;
mod placer;
mod writer;

#[cfg(test)]
mod layout_tests;
#[cfg(test)]
mod writer_tests;

pub use archive::{Archive, MAX_ARCHIVE_SIZE};
pub use error::LayoutError;
pub use index::{IndexEntry, IndexStats, StructIndex};
pub use layout::StructLayout;
pub use placer::Placer;
pub use writer::{LinkRecord, StructWriter};
