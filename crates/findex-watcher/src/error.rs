use std::path::PathBuf;
use thiserror::Error;

/// Failures setting up filesystem watching.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("none of the roots could be watched: {0:?}")]
    NoWatchableRoots(Vec<PathBuf>),
}
