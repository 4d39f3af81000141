//! Gold engine: resolve routes against the snapshot store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::error::RouteFailure;
use crate::network::{RequestSpec, Response, Transport, FETCH_TIMEOUT_MS};
use crate::registry::{Registry, RouteEntry};
use crate::storage::{EntryState, Filesystem, SnapshotStore};
use crate::{GolderError, Result};

use super::locks::RouteLocks;
use super::{GoldReport, GoldStats, Resolution, RouteOutcome, RouteStatus, Source};

/// Default number of routes golded at once by `gold_all`
pub const MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Default)]
struct Counters {
    cache_hits: AtomicUsize,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    preserved: AtomicUsize,
}

/// Serves registered routes from the store, re-golding them when stale
pub struct GoldEngine {
    registry: Arc<Registry>,
    store: SnapshotStore,
    transport: Arc<dyn Transport>,
    locks: RouteLocks,
    fetch_timeout: Duration,
    fetch_slots: Semaphore,
    counters: Counters,
}

impl GoldEngine {
    /// Create an engine over an existing registry and store
    #[must_use]
    pub fn new(registry: Arc<Registry>, store: SnapshotStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            store,
            transport,
            locks: RouteLocks::new(),
            fetch_timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
            fetch_slots: Semaphore::new(MAX_CONCURRENT_FETCHES),
            counters: Counters::default(),
        }
    }

    /// Build the registry for `config` and an engine over it
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the snapshot folders
    /// cannot be created
    pub async fn from_config(
        config: &SuiteConfig,
        fs: Arc<dyn Filesystem>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let registry = Registry::build(config, fs.as_ref()).await?;

        Ok(Self::new(Arc::new(registry), SnapshotStore::new(fs), transport)
            .with_fetch_timeout(Duration::from_millis(config.fetch_timeout_ms))
            .with_max_concurrent_fetches(config.max_concurrent_fetches))
    }

    /// Bound each upstream fetch
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Bound how many routes `gold_all` resolves at once
    ///
    /// # Panics
    ///
    /// Panics if `max` is 0
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        assert!(max > 0, "max_concurrent_fetches must be > 0");
        self.fetch_slots = Semaphore::new(max);
        self
    }

    /// The route registry
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The snapshot store
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Resolve the route registered for `url` with a plain GET
    ///
    /// # Errors
    ///
    /// See [`GoldEngine::resolve`]
    pub async fn resolve_url(&self, url: &str) -> Result<Resolution> {
        self.resolve(&RequestSpec::Simple(url.to_string())).await
    }

    /// Resolve the route registered for `request`'s URL
    ///
    /// A fresh snapshot is served without touching the network. Otherwise the
    /// request is sent upstream and the store is reconciled with the result:
    /// successes and repeated failures overwrite it, a failure with a new
    /// status keeps the previous snapshot.
    ///
    /// # Errors
    ///
    /// - `UnknownRoute` if the URL is not registered
    /// - `Upstream` if the first fetch of a route fails
    /// - `Network` if the transport fails or times out
    /// - `InvalidSnapshot` or `Io` if the store cannot be read or written
    pub async fn resolve(&self, request: &RequestSpec) -> Result<Resolution> {
        let url = request.url();
        let entry = self
            .registry
            .route_for_url(url)
            .ok_or_else(|| GolderError::UnknownRoute(url.to_string()))?;

        let _guard = self.locks.lock(url).await;

        let state = self
            .store
            .state(&entry.path, entry.route.refresh, SystemTime::now())
            .await?;

        if state.is_fresh() {
            let snapshot = self.store.read(&entry.path).await?;
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Serving {} from {}", url, entry.path.display());
            return Ok(Resolution {
                snapshot,
                source: Source::Cache,
            });
        }

        debug!("Golding {} ({:?})", url, state);
        let response = self.fetch(request).await?;

        if !response.is_failure() {
            return self.write(entry, &response).await;
        }

        if !state.exists() {
            return Err(GolderError::Upstream {
                url: url.to_string(),
                status: response.status,
            });
        }

        let previous = match self.store.read(&entry.path).await {
            Ok(previous) => previous,
            Err(GolderError::InvalidSnapshot { path, reason }) => {
                warn!("Ignoring unreadable snapshot {}: {reason}", path.display());
                return Err(GolderError::Upstream {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            Err(e) => return Err(e),
        };

        if previous.status() == response.status {
            info!(
                "re-golding {} returned code {} again; recording it",
                url, response.status
            );
            return self.write(entry, &response).await;
        }

        warn!(
            "re-golding {} returned code {}; serving the previous snapshot ({})",
            url,
            response.status,
            previous.status()
        );
        self.counters.preserved.fetch_add(1, Ordering::Relaxed);
        Ok(Resolution {
            snapshot: previous,
            source: Source::Preserved,
        })
    }

    /// Resolve every route, collecting failures instead of stopping at the
    /// first one
    ///
    /// # Errors
    ///
    /// Returns `GoldFailed` listing every route that could not be resolved,
    /// after all routes were attempted
    pub async fn gold_all(&self) -> Result<GoldReport> {
        let attempts = self.registry.routes().map(|entry| async move {
            // The semaphore is owned by the engine and never closed
            let _slot = self.fetch_slots.acquire().await.ok();
            let result = self.resolve_url(&entry.route.url).await;
            (entry, result)
        });

        let mut report = GoldReport::default();
        let mut failures = Vec::new();

        for (entry, result) in join_all(attempts).await {
            match result {
                Ok(resolution) => report.outcomes.push(RouteOutcome {
                    route: entry.route.name.clone(),
                    source: resolution.source,
                    status: resolution.snapshot.status(),
                }),
                Err(error) => {
                    warn!("Failed to gold {}: {error}", entry.route.name);
                    failures.push(RouteFailure {
                        route: entry.route.name.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Golded '{}': {} cached, {} fetched, {} preserved, {} failed",
            self.registry.name(),
            report.cached(),
            report.fetched(),
            report.preserved(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(GolderError::GoldFailed { failures })
        }
    }

    /// Snapshot state of every route, in registration order
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    pub async fn status(&self) -> Result<Vec<RouteStatus>> {
        let now = SystemTime::now();
        let mut statuses = Vec::with_capacity(self.registry.len());

        for entry in self.registry.routes() {
            let state = self
                .store
                .state(&entry.path, entry.route.refresh, now)
                .await?;
            statuses.push(RouteStatus {
                route: entry.route.clone(),
                path: entry.path.clone(),
                state,
            });
        }

        Ok(statuses)
    }

    /// Snapshot state of the route registered for `url`
    ///
    /// # Errors
    ///
    /// Returns `UnknownRoute` if the URL is not registered, or an error if the
    /// store cannot be queried
    pub async fn entry_state(&self, url: &str) -> Result<EntryState> {
        let entry = self
            .registry
            .route_for_url(url)
            .ok_or_else(|| GolderError::UnknownRoute(url.to_string()))?;

        self.store
            .state(&entry.path, entry.route.refresh, SystemTime::now())
            .await
    }

    /// Engine counters since creation
    #[must_use]
    pub fn stats(&self) -> GoldStats {
        GoldStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            preserved: self.counters.preserved.load(Ordering::Relaxed),
        }
    }

    async fn fetch(&self, request: &RequestSpec) -> Result<Response> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        match tokio::time::timeout(self.fetch_timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "GET {} timed out after {} ms",
                    request.url(),
                    self.fetch_timeout.as_millis()
                );
                Err(GolderError::Network(format!(
                    "GET {} timed out after {} ms",
                    request.url(),
                    self.fetch_timeout.as_millis()
                )))
            }
        }
    }

    async fn write(&self, entry: &RouteEntry, response: &Response) -> Result<Resolution> {
        let snapshot = self.store.write(&entry.path, response).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        info!(
            "Golded {} -> {} ({})",
            entry.route.url,
            entry.path.display(),
            response.status
        );
        Ok(Resolution {
            snapshot,
            source: Source::Fetched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StubTransport;
    use crate::policy::RefreshPolicy;
    use crate::storage::MemoryFilesystem;
    use std::path::Path;

    const HOMEPAGE_URL: &str = "http://duckduckgo.com/robots.txt";

    struct Fixture {
        engine: GoldEngine,
        fs: Arc<MemoryFilesystem>,
        stub: Arc<StubTransport>,
    }

    async fn fixture(config: SuiteConfig) -> Fixture {
        let fs = Arc::new(MemoryFilesystem::new());
        let stub = Arc::new(StubTransport::new(200, "test-body"));
        let engine = GoldEngine::from_config(&config, fs.clone(), stub.clone())
            .await
            .unwrap();
        Fixture { engine, fs, stub }
    }

    async fn homepage() -> Fixture {
        fixture(SuiteConfig::new("homepage tests", "/golds").route(
            "homepage",
            HOMEPAGE_URL,
            Some(RefreshPolicy::Weekly),
        ))
        .await
    }

    fn homepage_path() -> &'static Path {
        Path::new("/golds/homepage-tests/homepage.json")
    }

    async fn age_snapshot(f: &Fixture, by: Duration) {
        f.engine
            .store()
            .set_written_at(homepage_path(), SystemTime::now() - by)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_resolve_fetches_then_serves_cache() {
        let f = homepage().await;

        let first = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(first.source, Source::Fetched);
        assert_eq!(first.snapshot.response.body, "test-body");
        assert_eq!(f.fs.write_count(), 1);

        let second = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.snapshot.response, first.snapshot.response);

        assert_eq!(f.stub.call_count(), 1);
        assert_eq!(f.fs.write_count(), 1);
        assert_eq!(
            f.engine.stats(),
            GoldStats {
                cache_hits: 1,
                fetches: 1,
                writes: 1,
                preserved: 0
            }
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_regolded() {
        let f = homepage().await;
        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();

        age_snapshot(&f, RefreshPolicy::Weekly.duration() + Duration::from_secs(1)).await;
        f.fs.reset_counts();
        f.stub.respond(200, "new-body");

        let again = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(again.source, Source::Fetched);
        assert_eq!(again.snapshot.response.body, "new-body");
        assert_eq!(f.stub.call_count(), 2);
        assert_eq!(f.fs.write_count(), 1);
        assert_eq!(f.fs.read_count(), 0);
    }

    #[tokio::test]
    async fn test_no_policy_never_regolds() {
        let f = fixture(SuiteConfig::new("suite", "/golds").route("forever", HOMEPAGE_URL, None))
            .await;
        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();

        f.engine
            .store()
            .set_written_at(
                Path::new("/golds/suite/forever.json"),
                std::time::UNIX_EPOCH,
            )
            .await
            .unwrap();

        let again = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(again.source, Source::Cache);
        assert_eq!(f.stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_is_fatal() {
        let f = homepage().await;
        f.stub.respond(503, "unavailable");

        let result = f.engine.resolve_url(HOMEPAGE_URL).await;
        assert!(matches!(
            result,
            Err(GolderError::Upstream { status: 503, .. })
        ));
        assert!(!f.fs.exists(homepage_path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_changed_failure_status_preserves_snapshot() {
        let f = homepage().await;
        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        let before = f.fs.read(homepage_path()).await.unwrap();

        age_snapshot(&f, Duration::from_secs(8 * 86_400)).await;
        f.stub.respond(500, "boom");

        let resolution = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(resolution.source, Source::Preserved);
        assert_eq!(resolution.snapshot.status(), 200);
        assert_eq!(resolution.snapshot.response.body, "test-body");
        assert_eq!(f.fs.read(homepage_path()).await.unwrap(), before);
        assert_eq!(f.engine.stats().preserved, 1);
    }

    #[tokio::test]
    async fn test_repeated_failure_status_overwrites() {
        let f = homepage().await;
        f.stub.respond(200, "ok");
        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();

        // Capture a 404 over the 200 by making it the stored status first
        let not_found = Response {
            status: 404,
            body: "old 404".into(),
            ..Response::default()
        };
        f.engine
            .store()
            .write(homepage_path(), &not_found)
            .await
            .unwrap();
        age_snapshot(&f, Duration::from_secs(8 * 86_400)).await;
        f.stub.respond(404, "new 404");

        let resolution = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(resolution.source, Source::Fetched);
        assert_eq!(resolution.snapshot.response.body, "new 404");

        let stored = f.engine.store().read(homepage_path()).await.unwrap();
        assert_eq!(stored.status(), 404);
        assert_eq!(stored.response.body, "new 404");
    }

    #[tokio::test]
    async fn test_network_error_leaves_store_untouched() {
        let f = homepage().await;
        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        age_snapshot(&f, Duration::from_secs(8 * 86_400)).await;
        let before = f.fs.read(homepage_path()).await.unwrap();
        f.fs.reset_counts();
        f.stub.fail_with("connection reset");

        let result = f.engine.resolve_url(HOMEPAGE_URL).await;
        assert!(matches!(result, Err(GolderError::Network(_))));
        assert_eq!(f.fs.write_count(), 0);
        assert_eq!(f.fs.read(homepage_path()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_network_error() {
        let fs = Arc::new(MemoryFilesystem::new());
        let stub = Arc::new(StubTransport::new(200, "slow").with_delay(Duration::from_secs(5)));
        let config = SuiteConfig::new("suite", "/golds").route("slow", HOMEPAGE_URL, None);
        let engine = GoldEngine::from_config(&config, fs.clone(), stub)
            .await
            .unwrap()
            .with_fetch_timeout(Duration::from_millis(20));

        let result = engine.resolve_url(HOMEPAGE_URL).await;
        match result {
            Err(GolderError::Network(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let f = homepage().await;
        let result = f.engine.resolve_url("http://example.com/").await;
        assert!(matches!(result, Err(GolderError::UnknownRoute(_))));
        assert_eq!(f.stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_fresh_snapshot_is_an_error() {
        let f = homepage().await;
        f.fs.write(homepage_path(), b"not json").await.unwrap();

        let result = f.engine.resolve_url(HOMEPAGE_URL).await;
        assert!(matches!(result, Err(GolderError::InvalidSnapshot { .. })));
        assert_eq!(f.stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_stale_snapshot_is_replaced_on_success() {
        let f = homepage().await;
        f.fs.write(homepage_path(), b"not json").await.unwrap();
        age_snapshot(&f, Duration::from_secs(8 * 86_400)).await;

        let resolution = f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert_eq!(resolution.source, Source::Fetched);
        assert!(f.engine.store().read(homepage_path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_options_are_passed_through() {
        let f = homepage().await;
        let options = crate::network::RequestOptions::default().header("Accept", "text/plain");
        let request = RequestSpec::WithOptions(HOMEPAGE_URL.to_string(), options);

        f.engine.resolve(&request).await.unwrap();
        assert_eq!(f.stub.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_fetch_once() {
        let fs = Arc::new(MemoryFilesystem::new());
        let stub = Arc::new(StubTransport::new(200, "ok").with_delay(Duration::from_millis(20)));
        let config =
            SuiteConfig::new("suite", "/golds").route("r", HOMEPAGE_URL, Some(RefreshPolicy::Daily));
        let engine = GoldEngine::from_config(&config, fs.clone(), stub.clone())
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            engine.resolve_url(HOMEPAGE_URL),
            engine.resolve_url(HOMEPAGE_URL)
        );
        let mut sources = [a.unwrap().source, b.unwrap().source];
        sources.sort_by_key(|s| *s == Source::Cache);

        assert_eq!(sources, [Source::Fetched, Source::Cache]);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(fs.write_count(), 1);
    }

    #[tokio::test]
    async fn test_entry_state_follows_age() {
        let f = homepage().await;
        assert_eq!(
            f.engine.entry_state(HOMEPAGE_URL).await.unwrap(),
            EntryState::Missing
        );

        f.engine.resolve_url(HOMEPAGE_URL).await.unwrap();
        assert!(f.engine.entry_state(HOMEPAGE_URL).await.unwrap().is_fresh());

        age_snapshot(&f, Duration::from_secs(8 * 86_400)).await;
        assert!(matches!(
            f.engine.entry_state(HOMEPAGE_URL).await.unwrap(),
            EntryState::Stale { .. }
        ));

        assert!(matches!(
            f.engine.entry_state("http://example.com/").await,
            Err(GolderError::UnknownRoute(_))
        ));
        assert_eq!(f.stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_every_route() {
        let f = fixture(
            SuiteConfig::new("suite", "/golds")
                .route("a", "http://a/", Some(RefreshPolicy::Hourly))
                .route("b", "http://b/", None),
        )
        .await;
        f.engine.resolve_url("http://a/").await.unwrap();

        let statuses = f.engine.status().await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].route.name, "a");
        assert!(statuses[0].state.is_fresh());
        assert_eq!(statuses[1].state, EntryState::Missing);
    }
}
