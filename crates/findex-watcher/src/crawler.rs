//! Full crawl of the configured roots.
//!
//! A crawl starts from an empty index, walks every root in sorted
//! order and writes records in batches, reporting progress after each
//! batch. Metadata is only stamped once the whole walk finished, so an
//! interrupted crawl is picked up as stale on the next start.

use crate::walk::{log_walk_error, walk};
use findex_core::{ConfigError, ExclusionPolicy, FileRecord, Settings};
use findex_store::{
    Index, StoreError, META_LAST_EXCLUDE_PATTERNS, META_LAST_INDEXED_AT, META_LAST_SEARCH_PATHS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Phase reported in a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Starting,
    Indexing,
    Complete,
}

/// Progress of a running crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    pub status: CrawlStatus,
    /// Records written so far.
    pub files_processed: usize,
    /// Directory being walked when the update was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_path: Option<String>,
}

impl CrawlProgress {
    fn new(status: CrawlStatus, files_processed: usize, current_path: Option<String>) -> Self {
        Self {
            status,
            files_processed,
            current_path,
        }
    }
}

/// Result of a completed crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Records in the index after the crawl.
    pub files_indexed: usize,
    /// Entries (or whole roots) that could not be read.
    pub unreadable: usize,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// What to crawl and how.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub roots: Vec<PathBuf>,
    pub max_depth: usize,
    pub batch_size: usize,
    pub policy: ExclusionPolicy,
    /// The user patterns behind `policy`, stamped with the crawl.
    pub exclude_patterns: Vec<String>,
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            roots: settings.resolved_roots()?,
            max_depth: settings.max_depth,
            batch_size: settings.batch_size,
            policy: settings.exclusion_policy(),
            exclude_patterns: settings.exclude_patterns.clone(),
        })
    }
}

/// Pending records plus running totals for one crawl.
struct Batch {
    records: Vec<FileRecord>,
    written: usize,
    unreadable: usize,
}

/// Walks the roots and rebuilds the index from scratch.
pub struct Crawler {
    index: Arc<Index>,
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(index: Arc<Index>, options: CrawlOptions) -> Self {
        Self { index, options }
    }

    /// Runs the crawl, calling `on_progress` at start, after every
    /// flushed batch and at completion.
    ///
    /// Unreadable entries are skipped. Store failures abort the crawl.
    pub fn run<F>(&self, mut on_progress: F) -> Result<CrawlSummary, StoreError>
    where
        F: FnMut(CrawlProgress),
    {
        let start = Instant::now();
        info!(
            "Starting crawl of {} root(s), max depth {}",
            self.options.roots.len(),
            self.options.max_depth
        );
        on_progress(CrawlProgress::new(CrawlStatus::Starting, 0, None));

        self.index.clear()?;

        let mut batch = Batch {
            records: Vec::with_capacity(self.batch_size()),
            written: 0,
            unreadable: 0,
        };

        for root in &self.options.roots {
            self.crawl_root(root, &mut batch, &mut on_progress)?;
        }

        if !batch.records.is_empty() {
            self.flush(&mut batch)?;
            on_progress(CrawlProgress::new(
                CrawlStatus::Indexing,
                batch.written,
                None,
            ));
        }

        self.stamp_metadata()?;

        let summary = CrawlSummary {
            files_indexed: self.index.count(),
            unreadable: batch.unreadable,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Crawl complete: {} records in {}ms ({} unreadable)",
            summary.files_indexed, summary.duration_ms, summary.unreadable
        );
        on_progress(CrawlProgress::new(
            CrawlStatus::Complete,
            summary.files_indexed,
            None,
        ));

        Ok(summary)
    }

    fn crawl_root<F>(&self, root: &Path, batch: &mut Batch, on_progress: &mut F) -> Result<(), StoreError>
    where
        F: FnMut(CrawlProgress),
    {
        if !root.is_dir() {
            warn!("Skipping root {}: not a readable directory", root.display());
            batch.unreadable += 1;
            return Ok(());
        }

        debug!("Crawling {}", root.display());

        for entry in walk(root, self.options.max_depth, &self.options.policy) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log_walk_error(&err);
                    batch.unreadable += 1;
                    continue;
                }
            };

            let Some(record) = FileRecord::from_path(entry.path(), entry.file_type().is_dir())
            else {
                continue;
            };
            batch.records.push(record);

            if batch.records.len() >= self.batch_size() {
                self.flush(batch)?;
                let current = entry.path().parent().map(|p| p.display().to_string());
                on_progress(CrawlProgress::new(
                    CrawlStatus::Indexing,
                    batch.written,
                    current,
                ));
            }
        }

        Ok(())
    }

    fn flush(&self, batch: &mut Batch) -> Result<(), StoreError> {
        self.index.upsert_batch(&batch.records)?;
        batch.written += batch.records.len();
        batch.records.clear();
        Ok(())
    }

    fn stamp_metadata(&self) -> Result<(), StoreError> {
        let store = self.index.store();
        store.set_metadata(META_LAST_INDEXED_AT, &chrono::Utc::now().timestamp_millis())?;

        let roots: Vec<String> = self
            .options
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect();
        store.set_metadata(META_LAST_SEARCH_PATHS, &roots)?;
        store.set_metadata(META_LAST_EXCLUDE_PATTERNS, &self.options.exclude_patterns)?;
        store.flush()
    }

    fn batch_size(&self) -> usize {
        self.options.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findex_store::IndexStore;
    use std::fs;
    use tempfile::tempdir;

    fn options(root: &Path, max_depth: usize) -> CrawlOptions {
        CrawlOptions {
            roots: vec![root.to_path_buf()],
            max_depth,
            batch_size: 2,
            policy: ExclusionPolicy::default(),
            exclude_patterns: Vec::new(),
        }
    }

    fn index() -> Arc<Index> {
        Arc::new(Index::new(IndexStore::temporary().unwrap(), true))
    }

    #[test]
    fn test_depth_boundary() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c/d")).unwrap();
        fs::write(dir.path().join("a/b/c/deep.txt"), "x").unwrap();
        fs::write(dir.path().join("a/b/c/d/deeper.txt"), "x").unwrap();

        let index = index();
        let summary = Crawler::new(index.clone(), options(dir.path(), 2))
            .run(|_| {})
            .unwrap();

        let root = dir.path();
        let has = |rel: &str| index.kind_of(&root.join(rel).display().to_string()).unwrap();
        assert_eq!(has("a"), Some(true));
        assert_eq!(has("a/b"), Some(true));
        assert_eq!(has("a/b/c"), Some(true));
        assert_eq!(has("a/b/c/deep.txt"), None);
        assert_eq!(has("a/b/c/d"), None);
        assert_eq!(summary.files_indexed, 3);
    }

    #[test]
    fn test_rebuild_drops_stale_records() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "x").unwrap();
        let index = index();
        index
            .upsert(FileRecord::new("/gone/elsewhere.txt", "elsewhere.txt", false))
            .unwrap();

        let summary = Crawler::new(index.clone(), options(dir.path(), 8))
            .run(|_| {})
            .unwrap();

        assert_eq!(summary.files_indexed, 1);
        assert_eq!(index.store().count(), 1);
        assert!(index.kind_of("/gone/elsewhere.txt").unwrap().is_none());
    }

    #[test]
    fn test_excluded_entries_are_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "x").unwrap();
        fs::write(dir.path().join("setup.exe"), "x").unwrap();
        fs::write(dir.path().join(".env"), "x").unwrap();

        let index = index();
        Crawler::new(index.clone(), options(dir.path(), 8))
            .run(|_| {})
            .unwrap();

        let paths: Vec<String> = index
            .store()
            .get_all()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(paths, vec!["src", "main.rs"]);
    }

    #[test]
    fn test_progress_and_metadata() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("file{}.txt", i)), "x").unwrap();
        }

        let index = index();
        let mut updates = Vec::new();
        Crawler::new(index.clone(), options(dir.path(), 8))
            .run(|p| updates.push(p))
            .unwrap();

        assert_eq!(updates.first().unwrap().status, CrawlStatus::Starting);
        let last = updates.last().unwrap();
        assert_eq!(last.status, CrawlStatus::Complete);
        assert_eq!(last.files_processed, 5);
        // Batches of two: 2, 4, then the remainder.
        let indexing = updates
            .iter()
            .filter(|p| p.status == CrawlStatus::Indexing)
            .count();
        assert_eq!(indexing, 3);

        let stamped: Option<i64> = index.store().get_metadata(META_LAST_INDEXED_AT).unwrap();
        assert!(stamped.is_some());
        let roots: Option<Vec<String>> =
            index.store().get_metadata(META_LAST_SEARCH_PATHS).unwrap();
        assert_eq!(roots, Some(vec![dir.path().display().to_string()]));
        let excludes: Option<Vec<String>> = index
            .store()
            .get_metadata(META_LAST_EXCLUDE_PATTERNS)
            .unwrap();
        assert_eq!(excludes, Some(Vec::new()));
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("here.txt"), "x").unwrap();

        let mut opts = options(dir.path(), 8);
        opts.roots.insert(0, dir.path().join("missing"));

        let summary = Crawler::new(index(), opts).run(|_| {}).unwrap();
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.unreadable, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_does_not_abort() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("secret.txt"), "x").unwrap();
        fs::write(dir.path().join("before.txt"), "x").unwrap();
        fs::write(dir.path().join("zafter.txt"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits don't stop root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let index = index();
        let result = Crawler::new(index.clone(), options(dir.path(), 8)).run(|_| {});
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let summary = result.unwrap();
        assert!(summary.unreadable >= 1);
        let has = |rel: &str| {
            index
                .kind_of(&dir.path().join(rel).display().to_string())
                .unwrap()
        };
        assert_eq!(has("before.txt"), Some(false));
        assert_eq!(has("zafter.txt"), Some(false));
        assert_eq!(has("locked"), Some(true));
        assert_eq!(has("locked/secret.txt"), None);
    }
}
