use findex_core::ConfigError;
use findex_store::StoreError;
use findex_watcher::WatchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("index task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
