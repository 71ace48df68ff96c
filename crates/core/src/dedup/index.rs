//! In-memory cache of already-processed source ids.

use std::collections::HashSet;
use std::sync::RwLock;

/// Fast "already processed" membership set, scoped to one batch run.
///
/// Only a cache in front of the authoritative store. Inserts are idempotent,
/// so concurrent repairs of the same id are harmless.
#[derive(Debug, Default)]
pub struct FastIndex {
    ids: RwLock<HashSet<String>>,
}

impl FastIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index pre-seeded with `ids`.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.ids
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(source_id)
    }

    /// Inserts `source_id`; returns whether it was newly added.
    pub fn insert(&self, source_id: &str) -> bool {
        let mut ids = self.ids.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ids.contains(source_id) {
            return false;
        }
        ids.insert(source_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_is_idempotent() {
        let index = FastIndex::new();
        assert!(index.insert("abc"));
        assert!(!index.insert("abc"));
        assert!(index.contains("abc"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_with_ids() {
        let index = FastIndex::with_ids(["a", "b"]);
        assert!(index.contains("a"));
        assert!(!index.contains("c"));
        assert!(!index.is_empty());
    }

    #[test]
    fn test_concurrent_repairs_of_same_id() {
        let index = Arc::new(FastIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || index.insert("shared"))
            })
            .collect();
        let newly_added = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();

        assert_eq!(newly_added, 1);
        assert_eq!(index.len(), 1);
    }
}
