//! The search engine: one index, its readiness state and its upkeep.
//!
//! An [`Engine`] owns everything a running instance needs (store,
//! mirror, flags, listener, event channel), so several engines can live
//! side by side in one process. Cloning is cheap and shares the instance.

use crate::error::Result;
use crate::state::{BuildLock, IndexState, IndexStatus};
use chrono::{DateTime, TimeZone, Utc};
use findex_core::{parse_query, rank, ScoredCandidate, SearchHit, Settings};
use findex_store::{
    Index, IndexStore, META_LAST_EXCLUDE_PATTERNS, META_LAST_INDEXED_AT, META_LAST_SEARCH_PATHS,
    META_RECENT_SEARCHES,
};
use findex_watcher::{
    search_live, ChangeListener, CrawlOptions, CrawlProgress, Crawler, ListenerOptions,
};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Candidates fetched per requested result, leaving room for post-filtering.
const OVERSIZE: usize = 2;

/// Recent-search history length.
pub const MAX_RECENT_SEARCHES: usize = 20;

const EVENT_CAPACITY: usize = 256;

/// Pushed to subscribers while the index changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Progress(CrawlProgress),
    /// The index finished building and answers queries.
    Ready { count: usize },
}

/// How `start` left the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// An existing index was loaded and is ready.
    Loaded { count: usize, refresh_scheduled: bool },
    /// No index yet. A crawl runs in the background.
    Indexing,
}

/// Outcome of a rebuild request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    Completed(IndexStatus),
    /// Another crawl was running; this request did nothing.
    AlreadyRunning(IndexStatus),
}

impl Rebuild {
    pub fn status(&self) -> IndexStatus {
        match self {
            Self::Completed(status) | Self::AlreadyRunning(status) => *status,
        }
    }
}

/// Per-query knobs. Defaults come from the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    pub directories_only: bool,
}

impl SearchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            limit: settings.max_results,
            directories_only: settings.show_only_directories,
        }
    }
}

struct Inner {
    settings: RwLock<Settings>,
    /// Bumped, under the settings write lock, whenever new settings
    /// invalidate the index.
    generation: AtomicU64,
    index: Arc<Index>,
    state: Arc<IndexState>,
    listener: Mutex<Option<ChangeListener>>,
    events: broadcast::Sender<IndexEvent>,
    recent: Mutex<()>,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Opens (or creates) the database at `db_path`.
    pub fn open(settings: Settings, db_path: &Path) -> Result<Self> {
        let store = IndexStore::open(db_path)?;
        Ok(Self::new(settings, store))
    }

    pub fn new(settings: Settings, store: IndexStore) -> Self {
        let index = Arc::new(Index::new(store, settings.in_memory_mirror));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                settings: RwLock::new(settings),
                generation: AtomicU64::new(0),
                index,
                state: Arc::new(IndexState::new()),
                listener: Mutex::new(None),
                events,
                recent: Mutex::new(()),
            }),
        }
    }

    /// Brings the engine up without blocking on a crawl.
    ///
    /// An existing index is loaded and marked ready at once; if it is
    /// stale a background rebuild is scheduled after the refresh delay.
    /// Without an index, a crawl is spawned and queries use the live walk
    /// until it completes. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<Startup> {
        let Some(count) = self.load()? else {
            info!("No index found, building one in the background");
            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.rebuild().await {
                    error!("Initial index build failed: {}", e);
                }
            });
            return Ok(Startup::Indexing);
        };

        if self.settings().watch {
            if let Err(e) = self.start_listener() {
                warn!("Change listener not started: {}", e);
            }
        }

        let refresh_scheduled = self.is_stale()?;
        if refresh_scheduled {
            self.schedule_refresh(self.settings().refresh_delay());
        }

        Ok(Startup::Loaded {
            count,
            refresh_scheduled,
        })
    }

    /// Makes an existing index queryable. None if there is nothing stored.
    ///
    /// Unlike [`Engine::start`] this neither watches nor schedules a refresh.
    pub fn load(&self) -> Result<Option<usize>> {
        let index = &self.inner.index;
        if index.store().is_empty() {
            return Ok(None);
        }

        let count = index.load_mirror()?;
        self.inner.state.set_ready(true);
        self.emit(IndexEvent::Ready { count });
        info!("Index ready with {} records", count);
        Ok(Some(count))
    }

    /// When the last full crawl completed.
    pub fn last_indexed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let millis = self
            .inner
            .index
            .store()
            .get_metadata::<i64>(META_LAST_INDEXED_AT)?;
        Ok(millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    /// True when the index should be rebuilt: never stamped, too old, or
    /// built for different roots or exclude patterns.
    pub fn is_stale(&self) -> Result<bool> {
        let store = self.inner.index.store();
        let settings = self.settings();

        let Some(last) = store.get_metadata::<i64>(META_LAST_INDEXED_AT)? else {
            return Ok(true);
        };
        let age_ms = Utc::now().timestamp_millis().saturating_sub(last);
        if age_ms > 0 && age_ms as u128 > settings.staleness().as_millis() {
            debug!("Index is {}s old", age_ms / 1000);
            return Ok(true);
        }

        let current: Vec<String> = settings
            .resolved_roots()?
            .iter()
            .map(|r| r.display().to_string())
            .collect();
        let last_roots = store.get_metadata::<Vec<String>>(META_LAST_SEARCH_PATHS)?;
        if last_roots.as_ref() != Some(&current) {
            return Ok(true);
        }

        let last_excludes = store.get_metadata::<Vec<String>>(META_LAST_EXCLUDE_PATTERNS)?;
        Ok(last_excludes.as_ref() != Some(&settings.exclude_patterns))
    }

    /// Searches with the configured result cap and directory filter.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let options = SearchOptions::from_settings(&self.settings());
        self.search_with(query, options).await
    }

    /// Runs one query. Never fails: problems are logged and yield no hits.
    pub async fn search_with(&self, query: &str, options: SearchOptions) -> Vec<SearchHit> {
        let terms = parse_query(query);
        if terms.is_empty() || options.limit == 0 {
            return Vec::new();
        }
        let fetch = options.limit.saturating_mul(OVERSIZE);

        let candidates = if self.uses_index() {
            match self.inner.index.candidates(&terms, fetch) {
                Ok(records) => {
                    let mut scored: Vec<ScoredCandidate> = records
                        .into_iter()
                        .filter_map(|r| ScoredCandidate::score(r, &terms))
                        .collect();
                    rank(&mut scored);
                    scored
                }
                Err(e) => {
                    error!("Index query failed: {}", e);
                    return Vec::new();
                }
            }
        } else {
            match self.live_candidates(terms, fetch).await {
                Some(found) => found,
                None => return Vec::new(),
            }
        };

        candidates
            .into_iter()
            .filter(|c| !options.directories_only || c.record.is_directory())
            .take(options.limit)
            .map(SearchHit::from)
            .collect()
    }

    fn uses_index(&self) -> bool {
        self.inner.state.is_ready() && !self.inner.index.is_empty()
    }

    async fn live_candidates(&self, terms: Vec<String>, cap: usize) -> Option<Vec<ScoredCandidate>> {
        let settings = self.settings();
        let roots = match settings.resolved_roots() {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Live search has no roots: {}", e);
                return None;
            }
        };
        let policy = settings.exclusion_policy();
        let depth = settings.live_search_max_depth;

        debug!("Index not ready, walking {} root(s) live", roots.len());
        match tokio::task::spawn_blocking(move || search_live(&roots, &policy, depth, &terms, cap))
            .await
        {
            Ok(found) => Some(found),
            Err(e) => {
                error!("Live search failed: {}", e);
                None
            }
        }
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            ready: self.inner.state.is_ready(),
            count: self.inner.index.count(),
            building: self.inner.state.is_building(),
        }
    }

    /// Rebuilds the index from scratch and waits for it.
    ///
    /// Queries use the live walk until the crawl completes. A request
    /// while a crawl is running does not cancel it and returns
    /// [`Rebuild::AlreadyRunning`].
    pub async fn rebuild(&self) -> Result<Rebuild> {
        self.crawl(true).await
    }

    /// Background variant: the old index keeps answering while it is rebuilt.
    async fn refresh(&self) -> Result<Rebuild> {
        self.crawl(false).await
    }

    async fn crawl(&self, explicit: bool) -> Result<Rebuild> {
        let Some(lock) = BuildLock::acquire(&self.inner.state) else {
            debug!("Rebuild requested while a crawl is running");
            return Ok(Rebuild::AlreadyRunning(self.status()));
        };
        let snapshot = self.snapshot();
        self.crawl_locked(lock, explicit, snapshot).await
    }

    /// Crawls with `snapshot`, then again for as long as the settings
    /// were replaced while a crawl ran.
    async fn crawl_locked(
        &self,
        mut lock: BuildLock,
        explicit: bool,
        mut snapshot: (Settings, u64),
    ) -> Result<Rebuild> {
        loop {
            let (settings, generation) = snapshot;
            self.crawl_once(lock, explicit, settings).await?;
            if generation == self.inner.generation.load(Ordering::Acquire) {
                break;
            }

            info!("Index settings changed during the crawl, crawling again");
            match BuildLock::acquire(&self.inner.state) {
                Some(next) => lock = next,
                // Whoever holds it checks the generation when done.
                None => break,
            }
            snapshot = self.snapshot();
        }

        Ok(Rebuild::Completed(self.status()))
    }

    async fn crawl_once(&self, lock: BuildLock, explicit: bool, settings: Settings) -> Result<()> {
        if explicit {
            self.inner.state.set_ready(false);
        }
        self.stop_listener();

        let options = CrawlOptions::from_settings(&settings)?;
        let index = Arc::clone(&self.inner.index);
        let events = self.inner.events.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let _lock = lock;
            Crawler::new(index, options).run(|progress| {
                // No subscribers is fine.
                let _ = events.send(IndexEvent::Progress(progress));
            })
        })
        .await?;

        let summary = match outcome {
            Ok(summary) => summary,
            Err(e) => {
                error!("Crawl failed: {}", e);
                self.inner.state.set_ready(false);
                return Err(e.into());
            }
        };

        self.inner.state.set_ready(true);
        self.emit(IndexEvent::Ready {
            count: summary.files_indexed,
        });

        if settings.watch {
            if let Err(e) = self.start_listener() {
                warn!("Change listener not restarted: {}", e);
            }
        }

        Ok(())
    }

    /// Current settings with their generation, read together.
    fn snapshot(&self) -> (Settings, u64) {
        let settings = self.inner.settings.read();
        (
            settings.clone(),
            self.inner.generation.load(Ordering::Acquire),
        )
    }

    fn schedule_refresh(&self, delay: Duration) {
        info!("Index is stale, refreshing in {}ms", delay.as_millis());
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = (Engine { inner }).refresh().await {
                error!("Background refresh failed: {}", e);
            }
        });
    }

    /// Starts watching the roots. A no-op if already watching.
    pub fn start_listener(&self) -> Result<()> {
        let mut slot = self.inner.listener.lock();
        if slot.is_some() {
            return Ok(());
        }
        let options = ListenerOptions::from_settings(&self.settings())?;
        *slot = Some(ChangeListener::start(
            options,
            Arc::clone(&self.inner.index),
        )?);
        Ok(())
    }

    pub fn stop_listener(&self) {
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// Applies new settings. Returns true if the index was rebuilt.
    ///
    /// Changing roots, exclusions or depth rebuilds the index and restarts
    /// the listener. Other changes apply in place.
    pub async fn reconfigure(&self, settings: Settings) -> Result<bool> {
        let previous = {
            let mut current = self.inner.settings.write();
            if current.index_changed(&settings) {
                self.inner.generation.fetch_add(1, Ordering::AcqRel);
            }
            std::mem::replace(&mut *current, settings.clone())
        };

        if previous.in_memory_mirror != settings.in_memory_mirror {
            self.inner.index.set_mirror_enabled(settings.in_memory_mirror);
            if settings.in_memory_mirror {
                self.inner.index.load_mirror()?;
            }
        }

        if previous.index_changed(&settings) {
            info!("Index settings changed, rebuilding");
            if let Rebuild::AlreadyRunning(_) = self.rebuild().await? {
                info!("A crawl is running; it will crawl again with the new settings");
            }
            return Ok(true);
        }

        if previous.watch != settings.watch {
            if settings.watch && self.inner.state.is_ready() {
                self.start_listener()?;
            } else if !settings.watch {
                self.stop_listener();
            }
        }
        Ok(false)
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: IndexEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Records a query, newest first, without duplicates.
    pub fn add_recent_search(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        let _guard = self.inner.recent.lock();
        let mut recent = self.recent_searches()?;
        if query.is_empty() {
            return Ok(recent);
        }

        recent.retain(|q| q != query);
        recent.insert(0, query.to_string());
        recent.truncate(MAX_RECENT_SEARCHES);
        self.inner
            .index
            .store()
            .set_metadata(META_RECENT_SEARCHES, &recent)?;
        Ok(recent)
    }

    pub fn recent_searches(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .index
            .store()
            .get_metadata(META_RECENT_SEARCHES)?
            .unwrap_or_default())
    }

    pub fn clear_recent_searches(&self) -> Result<()> {
        let _guard = self.inner.recent.lock();
        self.inner.index.store().remove_metadata(META_RECENT_SEARCHES)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findex_core::FileRecord;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn settings_for(root: &Path) -> Settings {
        Settings {
            search_paths: vec![root.to_path_buf()],
            watch: false,
            ..Settings::default()
        }
    }

    fn engine_for(root: &Path) -> Engine {
        Engine::new(settings_for(root), IndexStore::temporary().unwrap())
    }

    fn names(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_live_fallback_before_index() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x/notes.txt"), "x").unwrap();

        let engine = engine_for(dir.path());
        assert!(!engine.status().ready);

        let hits = engine.search("notes").await;
        assert_eq!(names(&hits), vec!["notes.txt"]);
        assert!(!hits[0].is_directory);
    }

    #[tokio::test]
    async fn test_rebuild_then_indexed_search() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("Dockerfile"), "x").unwrap();
        fs::write(dir.path().join("src/my_src.rs"), "x").unwrap();

        let engine = engine_for(dir.path());
        let rebuild = engine.rebuild().await.unwrap();
        let status = rebuild.status();
        assert!(matches!(rebuild, Rebuild::Completed(_)));
        assert!(status.ready);
        assert!(!status.building);
        assert_eq!(status.count, 3);

        let hits = engine.search("src").await;
        assert_eq!(names(&hits), vec!["src", "my_src.rs"]);

        let hits = engine.search("docker").await;
        assert_eq!(names(&hits), vec!["Dockerfile"]);
    }

    #[tokio::test]
    async fn test_empty_query_and_zero_limit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let engine = engine_for(dir.path());
        engine.rebuild().await.unwrap();

        assert!(engine.search("   ").await.is_empty());
        let options = SearchOptions {
            limit: 0,
            directories_only: false,
        };
        assert!(engine.search_with("a", options).await.is_empty());
    }

    #[tokio::test]
    async fn test_directories_only_and_cap() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("project")).unwrap();
        fs::create_dir_all(dir.path().join("projects")).unwrap();
        fs::write(dir.path().join("project.md"), "x").unwrap();

        let engine = engine_for(dir.path());
        engine.rebuild().await.unwrap();

        let dirs = engine
            .search_with(
                "project",
                SearchOptions {
                    limit: 10,
                    directories_only: true,
                },
            )
            .await;
        assert_eq!(names(&dirs), vec!["project", "projects"]);

        let capped = engine
            .search_with(
                "project",
                SearchOptions {
                    limit: 1,
                    directories_only: false,
                },
            )
            .await;
        assert_eq!(names(&capped), vec!["project"]);
    }

    #[tokio::test]
    async fn test_rebuild_clears_removed_files() {
        let dir = tempdir().unwrap();
        let doomed = dir.path().join("doomed.txt");
        fs::write(&doomed, "x").unwrap();
        fs::write(dir.path().join("kept.txt"), "x").unwrap();

        let engine = engine_for(dir.path());
        engine.rebuild().await.unwrap();
        assert_eq!(engine.status().count, 2);

        fs::remove_file(&doomed).unwrap();
        engine.rebuild().await.unwrap();

        assert_eq!(engine.status().count, 1);
        assert!(engine.search("doomed").await.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_while_building_is_noop() {
        let dir = tempdir().unwrap();
        let engine = engine_for(dir.path());

        let _lock = BuildLock::acquire(&engine.inner.state).unwrap();
        assert!(engine.status().building);

        let rebuild = engine.rebuild().await.unwrap();
        assert!(matches!(rebuild, Rebuild::AlreadyRunning(_)));
    }

    #[tokio::test]
    async fn test_progress_and_ready_events() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "x").unwrap();

        let engine = engine_for(dir.path());
        let mut events = engine.subscribe();
        engine.rebuild().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(IndexEvent::Progress(_))));
        assert_eq!(seen.last(), Some(&IndexEvent::Ready { count: 1 }));
    }

    #[tokio::test]
    async fn test_start_with_fresh_index() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "x").unwrap();
        let db = tempdir().unwrap();

        {
            let engine = Engine::open(settings_for(dir.path()), db.path()).unwrap();
            engine.rebuild().await.unwrap();
        }

        let engine = Engine::open(settings_for(dir.path()), db.path()).unwrap();
        let startup = engine.start().unwrap();
        assert_eq!(
            startup,
            Startup::Loaded {
                count: 1,
                refresh_scheduled: false
            }
        );
        assert!(engine.status().ready);
        assert!(engine.last_indexed_at().unwrap().is_some());
        assert_eq!(names(&engine.search("one").await), vec!["one.txt"]);
    }

    #[tokio::test]
    async fn test_staleness() {
        let dir = tempdir().unwrap();
        let store = IndexStore::temporary().unwrap();
        store
            .insert_or_replace(&FileRecord::new("/r/a", "a", false))
            .unwrap();
        let engine = Engine::new(settings_for(dir.path()), store);

        // Never stamped.
        assert!(engine.is_stale().unwrap());

        let store = engine.inner.index.store();
        let roots = vec![dir.path().display().to_string()];
        let excludes = engine.settings().exclude_patterns;
        store
            .set_metadata(META_LAST_INDEXED_AT, &chrono::Utc::now().timestamp_millis())
            .unwrap();
        store.set_metadata(META_LAST_SEARCH_PATHS, &roots).unwrap();
        store.set_metadata(META_LAST_EXCLUDE_PATTERNS, &excludes).unwrap();
        assert!(!engine.is_stale().unwrap());

        // Different exclude patterns.
        store
            .set_metadata(META_LAST_EXCLUDE_PATTERNS, &vec!["vendor".to_string()])
            .unwrap();
        assert!(engine.is_stale().unwrap());
        store.set_metadata(META_LAST_EXCLUDE_PATTERNS, &excludes).unwrap();

        // Different roots.
        store
            .set_metadata(META_LAST_SEARCH_PATHS, &vec!["/elsewhere".to_string()])
            .unwrap();
        assert!(engine.is_stale().unwrap());

        // Too old.
        store.set_metadata(META_LAST_SEARCH_PATHS, &roots).unwrap();
        let two_hours_ago = chrono::Utc::now().timestamp_millis() - 2 * 60 * 60 * 1000;
        store
            .set_metadata(META_LAST_INDEXED_AT, &two_hours_ago)
            .unwrap();
        assert!(engine.is_stale().unwrap());
    }

    #[tokio::test]
    async fn test_start_without_index_builds_in_background() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("late.txt"), "x").unwrap();
        let engine = engine_for(dir.path());
        let mut events = engine.subscribe();

        assert_eq!(engine.start().unwrap(), Startup::Indexing);

        loop {
            match events.recv().await.unwrap() {
                IndexEvent::Ready { count } => {
                    assert_eq!(count, 1);
                    break;
                }
                IndexEvent::Progress(_) => continue,
            }
        }
        assert!(engine.status().ready);
    }

    #[tokio::test]
    async fn test_reconfigure_new_roots_rebuilds() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(first.path().join("alpha.txt"), "x").unwrap();
        fs::write(second.path().join("beta.txt"), "x").unwrap();

        let engine = engine_for(first.path());
        engine.rebuild().await.unwrap();
        assert_eq!(names(&engine.search("alpha").await), vec!["alpha.txt"]);

        let rebuilt = engine
            .reconfigure(settings_for(second.path()))
            .await
            .unwrap();
        assert!(rebuilt);
        assert!(engine.search("alpha").await.is_empty());
        assert_eq!(names(&engine.search("beta").await), vec!["beta.txt"]);

        let mut same = settings_for(second.path());
        same.max_results = 5;
        assert!(!engine.reconfigure(same).await.unwrap());
        assert_eq!(engine.settings().max_results, 5);
    }

    #[tokio::test]
    async fn test_settings_replaced_mid_crawl_crawl_again() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(first.path().join("alpha.txt"), "x").unwrap();
        fs::write(second.path().join("beta.txt"), "x").unwrap();
        let engine = engine_for(first.path());

        // A crawl has taken the lock and its settings; then they change.
        let lock = BuildLock::acquire(&engine.inner.state).unwrap();
        let snapshot = engine.snapshot();
        assert!(engine
            .reconfigure(settings_for(second.path()))
            .await
            .unwrap());

        let outcome = engine.crawl_locked(lock, true, snapshot).await.unwrap();
        assert!(matches!(outcome, Rebuild::Completed(_)));
        assert!(!engine.status().building);
        assert!(engine.search("alpha").await.is_empty());
        assert_eq!(names(&engine.search("beta").await), vec!["beta.txt"]);
        assert!(!engine.is_stale().unwrap());
    }

    #[tokio::test]
    async fn test_reconfigured_excludes_reach_listener() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("seed.txt"), "x").unwrap();
        let watching = Settings {
            watch: true,
            debounce_ms: 50,
            ..settings_for(dir.path())
        };
        let engine = Engine::new(watching.clone(), IndexStore::temporary().unwrap());
        engine.rebuild().await.unwrap();
        assert!(engine.is_listening());

        let mut excluding = watching;
        excluding.exclude_patterns.push("vendor".to_string());
        assert!(engine.reconfigure(excluding).await.unwrap());
        assert!(engine.is_listening());

        fs::create_dir(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("marker.txt"), "x").unwrap();

        // The marker arrives no earlier than the directory created before it.
        let mut caught_up = false;
        for _ in 0..100 {
            if !engine.search("marker").await.is_empty() {
                caught_up = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(caught_up);
        assert!(engine.search("vendor").await.is_empty());
        engine.stop_listener();
    }

    #[tokio::test]
    async fn test_search_without_mirror() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), "x").unwrap();
        let settings = Settings {
            in_memory_mirror: false,
            ..settings_for(dir.path())
        };
        let engine = Engine::new(settings, IndexStore::temporary().unwrap());
        engine.rebuild().await.unwrap();

        assert_eq!(names(&engine.search("report").await), vec!["report.pdf"]);
    }

    #[test]
    fn test_recent_searches() {
        let engine = engine_for(&PathBuf::from("/unused"));

        engine.add_recent_search("alpha").unwrap();
        engine.add_recent_search(" beta ").unwrap();
        engine.add_recent_search("").unwrap();
        let recent = engine.add_recent_search("alpha").unwrap();
        assert_eq!(recent, vec!["alpha", "beta"]);

        for i in 0..30 {
            engine.add_recent_search(&format!("q{}", i)).unwrap();
        }
        let recent = engine.recent_searches().unwrap();
        assert_eq!(recent.len(), MAX_RECENT_SEARCHES);
        assert_eq!(recent[0], "q29");

        engine.clear_recent_searches().unwrap();
        assert!(engine.recent_searches().unwrap().is_empty());
    }
}
