//! The store and its mirror, kept in step.
//!
//! Every mutation goes to the store first. The mirror is only patched
//! once the store write succeeded, so on failure the store's view wins
//! and the mirror never shows data that was not persisted.

use crate::mirror::Mirror;
use crate::store::{IndexStore, Result};
use findex_core::FileRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

pub struct Index {
    store: IndexStore,
    mirror: Mirror,
    mirror_enabled: AtomicBool,
}

impl Index {
    pub fn new(store: IndexStore, mirror_enabled: bool) -> Self {
        Self {
            store,
            mirror: Mirror::new(),
            mirror_enabled: AtomicBool::new(mirror_enabled),
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// True when queries and patches go through the mirror.
    pub fn mirror_active(&self) -> bool {
        self.mirror_enabled.load(Ordering::Acquire) && self.mirror.is_loaded()
    }

    /// Turns the mirror on or off. Turning it off drops its contents.
    pub fn set_mirror_enabled(&self, enabled: bool) {
        self.mirror_enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.mirror.reset(false);
        }
    }

    /// Loads every stored record into the mirror. Returns the record count.
    pub fn load_mirror(&self) -> Result<usize> {
        if !self.mirror_enabled.load(Ordering::Acquire) {
            return Ok(self.store.count());
        }
        let records = self.store.get_all()?;
        let count = records.len();
        self.mirror.replace_all(records);
        info!("Loaded {} records into memory", count);
        Ok(count)
    }

    pub fn upsert(&self, record: FileRecord) -> Result<()> {
        self.store.insert_or_replace(&record)?;
        if self.mirror_active() {
            self.mirror.upsert(record);
        }
        Ok(())
    }

    /// Writes one batch atomically, then mirrors it.
    pub fn upsert_batch(&self, records: &[FileRecord]) -> Result<()> {
        self.store.insert_or_replace_batch(records)?;
        if self.mirror_active() {
            self.mirror.upsert_batch(records);
        }
        Ok(())
    }

    pub fn remove_path(&self, path: &str) -> Result<bool> {
        let removed = self.store.delete_by_path(path)?;
        if self.mirror_active() {
            self.mirror.remove(path);
        }
        Ok(removed)
    }

    pub fn remove_subtree(&self, prefix: &str) -> Result<usize> {
        let removed = self.store.delete_by_subtree(prefix)?;
        if self.mirror_active() {
            self.mirror.remove_subtree(prefix);
        }
        debug!("Dropped subtree {} ({} records)", prefix, removed);
        Ok(removed)
    }

    /// Empties the store. An enabled mirror becomes an accurate empty copy.
    pub fn clear(&self) -> Result<()> {
        self.store.clear_all()?;
        self.mirror
            .reset(self.mirror_enabled.load(Ordering::Acquire));
        Ok(())
    }

    pub fn count(&self) -> usize {
        if self.mirror_active() {
            self.mirror.len()
        } else {
            self.store.count()
        }
    }

    /// Cheap emptiness check. Unlike [`Index::count`] it never scans the store.
    pub fn is_empty(&self) -> bool {
        if self.mirror_active() {
            self.mirror.is_empty()
        } else {
            self.store.is_empty()
        }
    }

    /// Substring pre-filter from the mirror when it is live, else the store.
    pub fn candidates(&self, terms: &[String], limit: usize) -> Result<Vec<FileRecord>> {
        if self.mirror_active() {
            Ok(self.mirror.query_by_terms_substring(terms, limit))
        } else {
            self.store.query_by_terms_substring(terms, limit)
        }
    }

    /// Whether a known path is a directory. None for unknown paths.
    pub fn kind_of(&self, path: &str) -> Result<Option<bool>> {
        if self.mirror_active() {
            return Ok(self.mirror.get(path).map(|r| r.is_directory()));
        }
        Ok(self.store.get(path)?.map(|r| r.is_directory()))
    }
}
