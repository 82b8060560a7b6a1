//! Keeps the index in step with the filesystem between crawls.
//!
//! One debounced watcher covers every root. Only directories the crawler
//! would descend into are watched, each on its own: excluded subtrees and
//! anything below the depth bound never cost an OS watch. Directories that
//! appear later are added as they are indexed.
//!
//! Each settled path is looked at again on disk: if it still exists it is
//! (re)indexed, otherwise it and anything recorded beneath it is dropped.
//! Judging by current disk state makes the handler indifferent to event
//! order and coalescing.

use crate::error::WatchError;
use crate::walk::{log_walk_error, walk};
use findex_core::{ExclusionPolicy, FileRecord, Settings};
use findex_store::{Index, StoreError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// A settled change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// The path exists now (created, moved in or modified).
    Added(PathBuf),
    /// The path is gone.
    Removed(PathBuf),
}

impl FileChange {
    /// Classifies a path by whether it currently exists.
    pub fn observe(path: PathBuf) -> Self {
        match path.symlink_metadata() {
            Ok(_) => Self::Added(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::Removed(path),
            // Unreadable but present: treat as an update, the handler
            // will skip it if it can't stat the entry either.
            Err(_) => Self::Added(path),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Added(p) | Self::Removed(p) => p,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub roots: Vec<PathBuf>,
    pub policy: ExclusionPolicy,
    pub max_depth: usize,
    pub debounce: Duration,
}

impl ListenerOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, findex_core::ConfigError> {
        Ok(Self {
            roots: settings.resolved_roots()?,
            policy: settings.exclusion_policy(),
            max_depth: settings.max_depth,
            debounce: settings.debounce(),
        })
    }

    /// The root a path falls under, if any. The longest match wins.
    fn root_of(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }
}

/// Directories under an OS watch.
///
/// Shared with the event handler, which extends it as directories appear.
/// Lock order: `dirs`, then `debouncer`.
struct Watches {
    debouncer: Mutex<Option<Debouncer<RecommendedWatcher>>>,
    dirs: Mutex<HashSet<PathBuf>>,
}

impl Watches {
    fn watch(&self, dir: &Path) -> notify::Result<()> {
        let mut dirs = self.dirs.lock();
        if dirs.contains(dir) {
            return Ok(());
        }
        let mut debouncer = self.debouncer.lock();
        let Some(debouncer) = debouncer.as_mut() else {
            return Ok(());
        };
        debouncer
            .watcher()
            .watch(dir, RecursiveMode::NonRecursive)?;
        dirs.insert(dir.to_path_buf());
        Ok(())
    }

    /// Watches every directory in `dirs`. Returns how many failed.
    fn watch_all<I>(&self, dirs: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut failed = 0;
        for dir in dirs {
            if let Err(e) = self.watch(&dir) {
                debug!("Failed to watch {}: {}", dir.display(), e);
                failed += 1;
            }
        }
        failed
    }

    /// Drops bookkeeping for a removed path. The OS has already released
    /// the watches themselves.
    fn forget(&self, path: &Path) {
        self.dirs.lock().retain(|dir| !dir.starts_with(path));
    }

    fn len(&self) -> usize {
        self.dirs.lock().len()
    }
}

/// Watches the roots and patches the index as paths settle.
///
/// Watching stops when the listener is dropped.
pub struct ChangeListener {
    watches: Arc<Watches>,
    watched: Vec<PathBuf>,
}

impl ChangeListener {
    /// Starts watching every root that exists.
    ///
    /// Missing roots are skipped with a warning. It is an error only if
    /// none of them could be watched.
    pub fn start(options: ListenerOptions, index: Arc<Index>) -> Result<Self, WatchError> {
        let options = Arc::new(options);
        let handler_options = Arc::clone(&options);
        let watches = Arc::new(Watches {
            debouncer: Mutex::new(None),
            dirs: Mutex::new(HashSet::new()),
        });
        let handler_watches: Weak<Watches> = Arc::downgrade(&watches);

        let debouncer = new_debouncer(options.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let watches = handler_watches.upgrade();
                    for event in events {
                        let change = FileChange::observe(event.path);
                        match apply_change(&index, &handler_options, &change) {
                            Ok(new_dirs) => {
                                if let Some(watches) = &watches {
                                    if let FileChange::Removed(path) = &change {
                                        watches.forget(path);
                                    }
                                    watches.watch_all(new_dirs);
                                }
                            }
                            Err(e) => {
                                error!("Failed to apply change to {}: {}", change.path().display(), e)
                            }
                        }
                    }
                }
                Err(e) => log_notify_error(&e),
            }
        })?;
        *watches.debouncer.lock() = Some(debouncer);

        let mut watched = Vec::new();
        let mut failed = 0;
        for root in &options.roots {
            if !root.is_dir() {
                warn!("Not watching {}: not a directory", root.display());
                continue;
            }
            match watches.watch(root) {
                Ok(()) => {
                    watched.push(root.clone());
                    failed += watches.watch_all(watchable_dirs(root, &options));
                }
                Err(e) => warn!("Failed to watch {}: {}", root.display(), e),
            }
        }

        if watched.is_empty() && !options.roots.is_empty() {
            return Err(WatchError::NoWatchableRoots(options.roots.clone()));
        }
        if failed > 0 {
            warn!("{} directories could not be watched", failed);
        }

        info!(
            "Watching {} root(s), {} directories (debounce {}ms)",
            watched.len(),
            watches.len(),
            options.debounce.as_millis()
        );

        Ok(Self { watches, watched })
    }

    /// Roots currently being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.watched
    }

    #[cfg(test)]
    fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.watches.dirs.lock().iter().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Stops watching. Pending debounced events are discarded.
    pub fn stop(self) {
        let dirs = std::mem::take(&mut *self.watches.dirs.lock());
        if let Some(mut debouncer) = self.watches.debouncer.lock().take() {
            for dir in &dirs {
                if let Err(e) = debouncer.watcher().unwatch(dir) {
                    trace!("Unwatch {} failed: {}", dir.display(), e);
                }
            }
        }
        info!("Stopped watching {} root(s)", self.watched.len());
    }
}

/// Directories below `root` whose children are within the depth bound.
fn watchable_dirs(root: &Path, options: &ListenerOptions) -> Vec<PathBuf> {
    let Some(depth) = options.max_depth.checked_sub(1) else {
        return Vec::new();
    };
    walk(root, depth, &options.policy)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log_walk_error(&err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Applies one settled change to the index.
///
/// Paths outside every root are ignored. Additions honour the exclusion
/// policy and depth bound exactly as a crawl would. Removals do not, so
/// records left over from a looser configuration still get cleaned up.
///
/// Returns the directories indexed by this change whose children are
/// still within the depth bound, i.e. the ones that now need watching.
pub fn apply_change(
    index: &Index,
    options: &ListenerOptions,
    change: &FileChange,
) -> Result<Vec<PathBuf>, StoreError> {
    let path = change.path();
    let Some(root) = options.root_of(path) else {
        trace!("Ignoring event outside roots: {}", path.display());
        return Ok(Vec::new());
    };

    match change {
        FileChange::Removed(path) => remove(index, path).map(|()| Vec::new()),
        FileChange::Added(path) => add(index, options, root, path),
    }
}

fn remove(index: &Index, path: &Path) -> Result<(), StoreError> {
    let key = path.to_string_lossy();
    match index.kind_of(&key)? {
        Some(false) => {
            index.remove_path(&key)?;
        }
        // Directories, and paths we never saw, may have children recorded.
        Some(true) | None => {
            index.remove_subtree(&key)?;
        }
    }
    debug!("Removed {}", key);
    Ok(())
}

fn add(
    index: &Index,
    options: &ListenerOptions,
    root: &Path,
    path: &Path,
) -> Result<Vec<PathBuf>, StoreError> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(Vec::new());
    };
    let depth = match relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
    {
        // The root itself is never a record.
        0 => return Ok(Vec::new()),
        n => n - 1,
    };
    if depth > options.max_depth {
        return Ok(Vec::new());
    }

    let metadata = match path.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return remove(index, path).map(|()| Vec::new());
        }
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            return Ok(Vec::new());
        }
    };
    let is_directory = metadata.is_dir();

    if options.policy.excludes_relative(relative, is_directory) {
        trace!("Excluded {}", path.display());
        return Ok(Vec::new());
    }

    let Some(record) = FileRecord::from_path(path, is_directory) else {
        return Ok(Vec::new());
    };
    index.upsert(record)?;
    debug!("Indexed {}", path.display());

    let mut new_dirs = Vec::new();
    // A directory moved in arrives as a single event; pick up its contents.
    if is_directory && depth < options.max_depth {
        new_dirs.push(path.to_path_buf());
        add_contents(
            index,
            options,
            path,
            options.max_depth - depth - 1,
            &mut new_dirs,
        )?;
    }
    Ok(new_dirs)
}

/// Indexes everything under `dir` down to `max_depth` (relative to `dir`),
/// collecting the directories that can still hold indexed children.
fn add_contents(
    index: &Index,
    options: &ListenerOptions,
    dir: &Path,
    max_depth: usize,
    new_dirs: &mut Vec<PathBuf>,
) -> Result<(), StoreError> {
    let mut records = Vec::new();
    for entry in walk(dir, max_depth, &options.policy) {
        match entry {
            Ok(entry) => {
                let is_directory = entry.file_type().is_dir();
                // walkdir depth is 1 for the children of `dir`.
                if is_directory && entry.depth() <= max_depth {
                    new_dirs.push(entry.path().to_path_buf());
                }
                if let Some(record) = FileRecord::from_path(entry.path(), is_directory) {
                    records.push(record);
                }
            }
            Err(err) => {
                log_walk_error(&err);
            }
        }
    }
    if !records.is_empty() {
        index.upsert_batch(&records)?;
    }
    Ok(())
}

fn log_notify_error(err: &notify::Error) {
    match &err.kind {
        notify::ErrorKind::Io(io) if io.kind() == ErrorKind::PermissionDenied => {
            trace!("Permission denied while watching: {:?}", err.paths);
        }
        _ => warn!("Watch error: {}", err),
    }
}
