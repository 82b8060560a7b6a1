//! Index readiness and the one-crawl-at-a-time guard.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Snapshot answered by `getIndexStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub ready: bool,
    pub count: usize,
    pub building: bool,
}

/// Ready and building flags for one engine.
#[derive(Debug, Default)]
pub struct IndexState {
    ready: AtomicBool,
    building: AtomicBool,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }
}

/// Held for the duration of a crawl. Dropping it clears `building`.
#[derive(Debug)]
pub struct BuildLock {
    state: Arc<IndexState>,
}

impl BuildLock {
    /// Takes the lock, or returns None if a crawl is already running.
    pub fn acquire(state: &Arc<IndexState>) -> Option<Self> {
        state
            .building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                state: Arc::clone(state),
            })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        self.state.building.store(false, Ordering::Release);
    }
}
