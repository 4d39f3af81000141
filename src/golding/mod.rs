//! Fetch-and-reconcile engine
//!
//! Decides, per route, whether to serve the stored snapshot, fetch a fresh
//! one, or keep the old one when a re-fetch fails.

mod engine;
mod locks;

pub use engine::{GoldEngine, MAX_CONCURRENT_FETCHES};
pub use locks::RouteLocks;

use crate::registry::Route;
use crate::storage::{EntryState, Snapshot};
use std::path::PathBuf;

/// Where a resolved snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fresh snapshot served without a fetch
    Cache,
    /// Fetched and written to the store
    Fetched,
    /// Re-fetch failed with a new status; the previous snapshot was kept
    Preserved,
}

/// Result of resolving one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Snapshot now in the store
    pub snapshot: Snapshot,
    /// How it was obtained
    pub source: Source,
}

/// One route's outcome in a successful batch gold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Route name
    pub route: String,
    /// How the route was resolved
    pub source: Source,
    /// Stored status code
    pub status: u16,
}

/// Summary of a batch gold where every route resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldReport {
    /// Outcomes in registration order
    pub outcomes: Vec<RouteOutcome>,
}

impl GoldReport {
    fn count(&self, source: Source) -> usize {
        self.outcomes.iter().filter(|o| o.source == source).count()
    }

    /// Routes served from a fresh snapshot
    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(Source::Cache)
    }

    /// Routes fetched and written
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.count(Source::Fetched)
    }

    /// Routes whose previous snapshot was kept
    #[must_use]
    pub fn preserved(&self) -> usize {
        self.count(Source::Preserved)
    }
}

/// A route's snapshot state, for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStatus {
    /// The route
    pub route: Route,
    /// Snapshot file
    pub path: PathBuf,
    /// Missing, fresh or stale
    pub state: EntryState,
}

/// Engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoldStats {
    /// Resolutions served from a fresh snapshot
    pub cache_hits: usize,
    /// Transport calls made
    pub fetches: usize,
    /// Snapshots written
    pub writes: usize,
    /// Failed re-fetches that kept the previous snapshot
    pub preserved: usize,
}
