//! Integration tests for the key directory cache against a local stub
//! directory server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use rewardgate::{KeyDirectoryCache, KeyDirectoryConfig};

/// Stub key directory that counts how many times it was fetched
struct StubDirectory {
    hits: AtomicUsize,
    body: Value,
    status: StatusCode,
}

impl StubDirectory {
    fn serving(body: Value) -> Arc<Self> {
        Arc::new(Self {
            hits: AtomicUsize::new(0),
            body,
            status: StatusCode::OK,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            hits: AtomicUsize::new(0),
            body: Value::Null,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_keys(State(stub): State<Arc<StubDirectory>>) -> impl IntoResponse {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    (stub.status, Json(stub.body.clone()))
}

/// Spawn the stub on an ephemeral port and return its base URL
async fn spawn_stub(stub: Arc<StubDirectory>) -> String {
    let app = Router::new()
        .route("/keys.json", get(serve_keys))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/keys.json", addr)
}

fn directory_body() -> Value {
    json!({
        "keys": [
            {
                "keyId": 7,
                "pem": "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----",
                "base64": "c3R1Yi1rZXktbWF0ZXJpYWw="
            }
        ]
    })
}

fn config(url: String) -> KeyDirectoryConfig {
    KeyDirectoryConfig {
        url,
        fetch_timeout_secs: 2,
        cache_ttl_hours: 1,
    }
}

#[tokio::test]
async fn first_lookup_fetches_directory_exactly_once() {
    let stub = StubDirectory::serving(directory_body());
    let url = spawn_stub(stub.clone()).await;
    let cache = Arc::new(KeyDirectoryCache::new(&config(url)).unwrap());

    // Eight concurrent lookups against an empty cache collapse into one fetch.
    let lookups: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(7).await })
        })
        .collect();

    for lookup in lookups {
        assert!(lookup.await.unwrap().is_some());
    }
    assert_eq!(stub.hits(), 1);

    // Subsequent lookups are served from the snapshot.
    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn fetch_failure_returns_not_found_and_is_retried() {
    let stub = StubDirectory::failing();
    let url = spawn_stub(stub.clone()).await;
    let cache = KeyDirectoryCache::new(&config(url)).unwrap();

    // The failure is swallowed, not raised, and not cached.
    assert_eq!(cache.get(7).await, None);
    assert_eq!(stub.hits(), 1);

    assert_eq!(cache.get(7).await, None);
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn empty_key_list_is_not_cached() {
    let stub = StubDirectory::serving(json!({"keys": []}));
    let url = spawn_stub(stub.clone()).await;
    let cache = KeyDirectoryCache::new(&config(url)).unwrap();

    assert_eq!(cache.get(7).await, None);
    assert_eq!(cache.get(7).await, None);
    // Each lookup retried the fetch instead of negative-caching the miss.
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn unknown_key_id_does_not_refetch_a_fresh_directory() {
    let stub = StubDirectory::serving(directory_body());
    let url = spawn_stub(stub.clone()).await;
    let cache = KeyDirectoryCache::new(&config(url)).unwrap();

    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 1);

    // The directory is fresh and simply has no key 99: one refresh attempt
    // re-checks the snapshot and stops there.
    assert_eq!(cache.get(99).await, None);
    assert_eq!(cache.get(99).await, None);
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn expired_snapshot_is_refreshed_on_next_lookup() {
    let stub = StubDirectory::serving(directory_body());
    let url = spawn_stub(stub.clone()).await;
    let cache =
        KeyDirectoryCache::with_ttl(&config(url), Duration::from_millis(50)).unwrap();

    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;

    // Past the TTL, the key is never served without an attempted refresh.
    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn force_refresh_always_refetches() {
    let stub = StubDirectory::serving(directory_body());
    let url = spawn_stub(stub.clone()).await;
    let cache = KeyDirectoryCache::new(&config(url)).unwrap();

    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 1);

    cache.force_refresh().await;
    assert_eq!(stub.hits(), 2);

    assert!(cache.get(7).await.is_some());
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn undecodable_key_material_is_skipped() {
    let stub = StubDirectory::serving(json!({
        "keys": [
            {"keyId": 7, "pem": "", "base64": "c3R1Yi1rZXktbWF0ZXJpYWw="},
            {"keyId": 8, "pem": "", "base64": "!!!not base64!!!"}
        ]
    }));
    let url = spawn_stub(stub.clone()).await;
    let cache = KeyDirectoryCache::new(&config(url)).unwrap();

    assert!(cache.get(7).await.is_some());
    assert_eq!(cache.get(8).await, None);
    assert_eq!(stub.hits(), 1);
}
