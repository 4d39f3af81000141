//! Integration tests for request interception

use std::sync::Arc;

use golder::config::{SuiteConfig, UnregisteredPolicy};
use golder::golding::GoldEngine;
use golder::intercept::{Client, Interceptor};
use golder::network::{RequestOptions, RequestSpec, StubTransport};
use golder::policy::RefreshPolicy;
use golder::storage::MemoryFilesystem;
use golder::GolderError;

const HOMEPAGE_URL: &str = "http://duckduckgo.com/robots.txt";
const OTHER_URL: &str = "http://example.com/elsewhere";

struct Setup {
    client: Arc<Client>,
    live: Arc<StubTransport>,
    upstream: Arc<StubTransport>,
    engine: Arc<GoldEngine>,
}

/// The engine golds through `upstream`; the client's live transport is
/// `live`, so tests can tell which one a request reached
async fn setup(suite: &str) -> Setup {
    let config = SuiteConfig::new(suite, "/golds").route(
        "homepage",
        HOMEPAGE_URL,
        Some(RefreshPolicy::Weekly),
    );
    let upstream = Arc::new(StubTransport::new(200, "gold-body"));
    let engine = GoldEngine::from_config(&config, Arc::new(MemoryFilesystem::new()), upstream.clone())
        .await
        .unwrap();

    let live = Arc::new(StubTransport::new(200, "live-body"));
    Setup {
        client: Client::new(live.clone()),
        live,
        upstream,
        engine: Arc::new(engine),
    }
}

#[tokio::test]
async fn test_registered_url_served_from_gold() {
    let s = setup("homepage tests").await;
    let _installation =
        Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);

    let body = s.client.get(HOMEPAGE_URL).await.unwrap();
    assert_eq!(body, "gold-body");

    let response = s
        .client
        .send(HOMEPAGE_URL, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "gold-body");

    assert_eq!(s.upstream.call_count(), 1);
    assert_eq!(s.live.call_count(), 0);
    assert_eq!(s.engine.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_unregistered_url_passes_through_unchanged() {
    let s = setup("homepage tests").await;
    let _installation =
        Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);

    let options = RequestOptions::default()
        .header("Authorization", "Bearer token")
        .query("page", "2");
    let response = s.client.send(OTHER_URL, options.clone()).await.unwrap();

    assert_eq!(response.body, "live-body");
    assert_eq!(
        s.live.requests(),
        vec![RequestSpec::WithOptions(OTHER_URL.to_string(), options)]
    );
    assert_eq!(s.upstream.call_count(), 0);
}

#[tokio::test]
async fn test_unregistered_url_rejected() {
    let s = setup("homepage tests").await;
    let _installation = Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::Reject);

    let result = s.client.get(OTHER_URL).await;
    assert!(matches!(result, Err(GolderError::UnregisteredRoute(url)) if url == OTHER_URL));
    assert_eq!(s.live.call_count(), 0);

    assert_eq!(s.client.get(HOMEPAGE_URL).await.unwrap(), "gold-body");
}

#[tokio::test]
async fn test_reinstall_does_not_double_wrap() {
    let first = setup("first suite").await;
    let second = setup("second suite").await;
    let client = first.client.clone();

    let stale = Interceptor::install(&client, first.engine.clone(), UnregisteredPolicy::Reject);
    let _current = Interceptor::install(&client, second.engine.clone(), UnregisteredPolicy::PassThrough);

    // Only the second interceptor answers; the first is gone, not wrapped
    assert_eq!(client.get(OTHER_URL).await.unwrap(), "live-body");
    assert_eq!(client.get(HOMEPAGE_URL).await.unwrap(), "gold-body");
    assert_eq!(first.upstream.call_count(), 0);
    assert_eq!(second.upstream.call_count(), 1);
    assert_eq!(first.live.call_count(), 1);

    // Restoring the replaced installation leaves the current one in place
    assert!(!stale.restore());
    assert!(client.is_intercepted());
}

#[tokio::test]
async fn test_restore_returns_to_live_transport() {
    let s = setup("homepage tests").await;

    let installation =
        Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);
    assert!(s.client.is_intercepted());
    assert!(installation.restore());

    assert_eq!(s.client.get(HOMEPAGE_URL).await.unwrap(), "live-body");
    assert_eq!(s.upstream.call_count(), 0);

    {
        let _scoped =
            Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);
        assert!(s.client.is_intercepted());
    }
    assert!(!s.client.is_intercepted());
}

#[tokio::test]
async fn test_leaked_installation_stays_installed() {
    let s = setup("homepage tests").await;

    Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::Reject).leak();
    assert!(s.client.is_intercepted());

    assert_eq!(s.client.get(HOMEPAGE_URL).await.unwrap(), "gold-body");
    assert!(matches!(
        s.client.get(OTHER_URL).await,
        Err(GolderError::UnregisteredRoute(_))
    ));
    assert_eq!(s.live.call_count(), 0);

    // A later install still replaces it
    let current = Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);
    assert_eq!(s.client.get(OTHER_URL).await.unwrap(), "live-body");
    assert!(current.restore());
    assert!(!s.client.is_intercepted());
}

#[tokio::test]
async fn test_upstream_failure_surfaces_through_client() {
    let s = setup("homepage tests").await;
    s.upstream.respond(503, "unavailable");
    let _installation =
        Interceptor::install(&s.client, s.engine.clone(), UnregisteredPolicy::PassThrough);

    let result = s.client.get(HOMEPAGE_URL).await;
    assert!(matches!(result, Err(GolderError::Upstream { status: 503, .. })));
}
