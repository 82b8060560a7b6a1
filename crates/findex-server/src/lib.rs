//! Findex Server - the search engine and its JSON-RPC surface
//!
//! This crate ties the index, the crawler and the listener together:
//! - Answering queries from the index, or by walking the disk while
//!   no index is ready
//! - Deciding when to rebuild, and making sure only one crawl runs
//! - Exposing it all as JSON-RPC 2.0 over stdio, with progress pushed
//!   as notifications

mod engine;
mod error;
mod protocol;
mod rpc;
mod state;

pub use engine::{
    Engine, IndexEvent, Rebuild, SearchOptions, Startup, MAX_RECENT_SEARCHES,
};
pub use error::{EngineError, Result};
pub use protocol::{Notification, Request, Response, RpcError};
pub use rpc::RpcServer;
pub use state::{BuildLock, IndexState, IndexStatus};
