//! End-to-end tests for the cache router over real HTTP and a disk store.

use std::sync::Arc;

use somasave_core::cache::{
    CacheNames, CacheRouter, CacheStorage, DiskStorage, HttpFetcher, InstallError, Partition, Request,
    ResponseSource, RouteError, Routed,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATS_BODY: &str = r#"{"total_savings": "1250000.00", "loan_balance": 0, "shares": 10}"#;

fn router(
    server_uri: &str,
    dir: &TempDir,
    version: u32,
    token: Option<&str>,
) -> CacheRouter<DiskStorage, HttpFetcher> {
    let app_url = Url::parse(server_uri).unwrap();
    let storage = DiskStorage::new(dir.path().join("offline")).unwrap();
    let mut fetcher = HttpFetcher::new(app_url.origin()).unwrap();
    if let Some(token) = token {
        fetcher = fetcher.with_token(token);
    }
    CacheRouter::new(&app_url, version, Arc::new(storage), Arc::new(fetcher))
}

fn stats_request(server_uri: &str) -> Request {
    let url = Url::parse(server_uri).unwrap().join("/api/dashboard/stats/").unwrap();
    Request::get(url).with_header("accept", "application/json")
}

#[tokio::test]
async fn test_api_served_from_disk_when_server_is_gone() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats/"))
        .and(header("authorization", "Token tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATS_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let online = router(&uri, &dir, 1, Some("tok-123"));
    let first = online
        .handle(&stats_request(&uri))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(first.snapshot.text(), STATS_BODY);

    drop(server);

    // A fresh router over the same directory, as after a restart.
    let offline = router(&uri, &dir, 1, Some("tok-123"));
    let second = offline
        .handle(&stats_request(&uri))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.snapshot.text(), STATS_BODY);
}

#[tokio::test]
async fn test_api_offline_without_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let router = router(&uri, &dir, 1, None);
    let result = router.handle(&stats_request(&uri)).await;
    assert!(matches!(result, Err(RouteError::Unavailable { .. })));
}

#[tokio::test]
async fn test_error_status_is_returned_but_not_stored() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats/"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail": "Invalid token."}"#))
        .mount(&server)
        .await;

    let router = router(&uri, &dir, 1, None);
    let response = router
        .handle(&stats_request(&uri))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.snapshot.status, 401);
    assert_eq!(response.source, ResponseSource::Network);

    let store = router.names().name(Partition::Api);
    assert!(router.storage().keys(&store).await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_post_is_bypassed() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();

    let router = router(&uri, &dir, 1, None);
    let url = Url::parse(&uri).unwrap().join("/api/payment-requests/initiate-deposit/").unwrap();
    let routed = router.handle(&Request::new("POST", url)).await.unwrap();
    assert!(matches!(routed, Routed::Bypass));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_install_then_version_rollover() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>portal</html>"))
        .mount(&server)
        .await;

    let v1 = router(&uri, &dir, 1, None);
    let count = v1.install().await.expect("install failed");
    assert_eq!(count, 6);

    let shell = Url::parse(&uri).unwrap().join("/member-portal/savings").unwrap();
    let cached = v1.cached(&Request::navigate(shell)).await.expect("shell cached");
    assert_eq!(cached.text(), "<html>portal</html>");

    let v2 = router(&uri, &dir, 2, None);
    v2.install().await.unwrap();
    let removed = v2.activate().await.unwrap();
    assert_eq!(removed, vec![CacheNames::new(1).name(Partition::Precache)]);

    let remaining = v2.storage().store_names().await.unwrap();
    assert!(remaining.iter().all(|name| v2.names().is_current(name)));
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .with_priority(2)
        .mount(&server)
        .await;

    let router = router(&uri, &dir, 1, None);
    let err = router.install().await.unwrap_err();
    assert!(matches!(err, InstallError::Precache { ref url, .. } if url.ends_with("/manifest.json")));

    let store = router.names().name(Partition::Precache);
    assert!(router.storage().keys(&store).await.unwrap_or_default().is_empty());
}
