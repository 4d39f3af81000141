//! Per-route serialization

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per route URL, created on first use
///
/// Resolving a route checks the store, fetches and writes in separate steps,
/// so two resolutions of the same route must not overlap.
#[derive(Default)]
pub struct RouteLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RouteLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `url`
    pub async fn lock(&self, url: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(url.to_string()).or_default().value());
        lock.lock_owned().await
    }

    /// Number of routes that have been locked at least once
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no route has been locked yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
