use crate::{scope::ScopeSnapshot, search::SearchResult};
use serde::{Deserialize, Serialize};

/// Parsed answer for one query, stored with the scope it was asked under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub snapshot: ScopeSnapshot,
    pub results: Vec<SearchResult>,
    pub has_breadcrumbs: bool,
}

/// Fixed-size ring of recent answers. Once full, each insert overwrites the
/// oldest slot; lookups do not refresh an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    /// Slot written last, `None` before the first insert.
    cursor: Option<usize>,
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        SearchCache {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        let slot = self.cursor.map(|c| (c + 1) % self.capacity).unwrap_or(0);
        self.cursor = Some(slot);
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[slot] = entry;
        }
    }

    /// Exact match on key and scope.
    pub fn get(&self, key: &str, snapshot: &ScopeSnapshot) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|e| e.key == key && &e.snapshot == snapshot)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
