//! Findex Watcher - getting the filesystem into the index
//!
//! This crate handles the filesystem side of things:
//! - Crawling the configured roots into a fresh index
//! - Watching them and patching the index as paths change
//! - Walking them directly when no index is available yet
//!
//! All three walk the same way, so the exclusion policy and the depth
//! bound mean the same thing everywhere.

mod crawler;
mod error;
mod live;
mod walk;
mod watcher;

pub use crawler::{CrawlOptions, CrawlProgress, CrawlStatus, CrawlSummary, Crawler};
pub use error::WatchError;
pub use live::search_live;
pub use watcher::{apply_change, ChangeListener, FileChange, ListenerOptions};
