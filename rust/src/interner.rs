//! Dense integer ids for task nodes.
//!
//! Node ids are assigned in input order, so iterating `0..len` visits tasks
//! in the order the caller supplied them. Every ordering decision in the
//! engine relies on this.

use rustc_hash::FxHashMap;

/// Interned node id (u32 for compact storage and fast hashing).
pub type NodeId = u32;

/// Maps task id strings to dense node ids and back.
#[derive(Debug, Clone, Default)]
pub struct NodeInterner {
    to_int: FxHashMap<String, NodeId>,
    from_int: Vec<String>,
}

impl NodeInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_int: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_int: Vec::with_capacity(capacity),
        }
    }

    /// Assign the next id to `s`.
    ///
    /// Returns `Err(existing)` without modifying anything if `s` is already known.
    pub fn insert_unique(&mut self, s: &str) -> Result<NodeId, NodeId> {
        if let Some(&existing) = self.to_int.get(s) {
            return Err(existing);
        }
        let id = self.from_int.len() as NodeId;
        self.from_int.push(s.to_string());
        self.to_int.insert(s.to_string(), id);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, s: &str) -> Option<NodeId> {
        self.to_int.get(s).copied()
    }

    #[inline]
    pub fn resolve(&self, id: NodeId) -> Option<&str> {
        self.from_int.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.from_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_int.is_empty()
    }
}
