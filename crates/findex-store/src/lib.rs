//! Findex Store - the persistent file index
//!
//! Records live in a sled database; a path-ordered in-memory mirror
//! answers queries without a storage round-trip. The [`Index`] type
//! keeps the two consistent and is what the crawler, the change
//! listener and the search engine share.

mod index;
mod mirror;
mod store;

pub use index::Index;
pub use mirror::Mirror;
pub use store::{IndexStore, Result, StoreError};

/// Metadata key: unix millis of the last completed full crawl.
pub const META_LAST_INDEXED_AT: &str = "lastIndexedAt";
/// Metadata key: the roots used by the last completed full crawl.
pub const META_LAST_SEARCH_PATHS: &str = "lastSearchPaths";
/// Metadata key: the exclude patterns used by the last completed full crawl.
pub const META_LAST_EXCLUDE_PATTERNS: &str = "lastExcludePatterns";
/// Metadata key: recent search history, newest first.
pub const META_RECENT_SEARCHES: &str = "recentSearches";
