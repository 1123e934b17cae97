//! Content-keyed deduplication of shared structs.
//!
//! Two logically identical records (for example two identical tag sets)
//! should occupy one physical struct. The canonical-instance map is owned
//! by the producer building the archive, one per archive, not by the
//! struct itself.

use indexmap::IndexMap;
use std::hash::Hash;

use crate::StructId;

/// Map from structural content to the canonical struct carrying it.
///
/// Backed by an insertion-ordered map so that iterating shared structs for
/// placement is deterministic across runs. The content hash is computed
/// once per insert and cached by the map.
#[derive(Debug)]
pub struct SharedTable<T> {
    map: IndexMap<T, StructId>,
}

impl<T> Default for SharedTable<T> {
    fn default() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }
}

impl<T: Hash + Eq> SharedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `content` to its canonical struct, registering a new one via
    /// `create` on first sight. Equal content always yields the same id.
    pub fn get_or_insert(&mut self, content: T, create: impl FnOnce(&T) -> StructId) -> StructId {
        if let Some(&id) = self.map.get(&content) {
            return id;
        }
        let id = create(&content);
        self.map.insert(content, id);
        id
    }

    /// Look up the canonical struct without inserting.
    pub fn get(&self, content: &T) -> Option<StructId> {
        self.map.get(content).copied()
    }

    /// Number of distinct contents seen so far.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate contents with their canonical ids, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, StructId)> {
        self.map.iter().map(|(content, &id)| (content, id))
    }
}
