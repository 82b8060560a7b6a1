//! In-memory mirror of the index.
//!
//! The mirror is a cache, not a second source of truth. It is kept in
//! path order so that iterating it yields the same order as the store.

use findex_core::{contains_all_terms, is_within, FileRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct Mirror {
    records: RwLock<BTreeMap<String, FileRecord>>,
    loaded: AtomicBool,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the mirror reflects the store's contents.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Replaces everything and marks the mirror as loaded.
    pub fn replace_all(&self, records: Vec<FileRecord>) {
        let map = records
            .into_iter()
            .map(|r| (r.path().to_string(), r))
            .collect();
        *self.records.write() = map;
        self.loaded.store(true, Ordering::Release);
    }

    /// Empties the mirror. `loaded` says whether empty is now the truth.
    pub fn reset(&self, loaded: bool) {
        self.records.write().clear();
        self.loaded.store(loaded, Ordering::Release);
    }

    pub fn upsert(&self, record: FileRecord) {
        self.records.write().insert(record.path().to_string(), record);
    }

    pub fn upsert_batch(&self, records: &[FileRecord]) {
        let mut map = self.records.write();
        for record in records {
            map.insert(record.path().to_string(), record.clone());
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        self.records.write().remove(path).is_some()
    }

    /// Removes `prefix` and everything nested under it.
    pub fn remove_subtree(&self, prefix: &str) -> usize {
        let mut map = self.records.write();
        // Keys sharing the string prefix are contiguous in a BTreeMap.
        let doomed: Vec<String> = map
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .filter(|(path, _)| is_within(path, prefix))
            .map(|(path, _)| path.clone())
            .collect();

        for path in &doomed {
            map.remove(path);
        }
        doomed.len()
    }

    pub fn get(&self, path: &str) -> Option<FileRecord> {
        self.records.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Same contract as [`crate::IndexStore::query_by_terms_substring`].
    pub fn query_by_terms_substring<S: AsRef<str>>(
        &self,
        terms: &[S],
        limit: usize,
    ) -> Vec<FileRecord> {
        self.records
            .read()
            .values()
            .filter(|r| contains_all_terms(r.name_lower(), terms))
            .take(limit)
            .cloned()
            .collect()
    }
}
