// src/dedup.rs
use std::collections::HashSet;

/// Ids that have already been announced.
///
/// The poll loop owns the store and is the only writer, so implementations
/// need no interior locking.
pub trait DedupStore: Send {
    fn contains(&self, id: &str) -> bool;
    fn mark_seen(&mut self, id: &str);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime store. Grows monotonically and resets on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryDedupStore {
    seen: HashSet<String>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupStore for MemoryDedupStore {
    fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_string());
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}
