//! Cache for the ad network's rotating public verification keys.
//!
//! The network publishes its keys at a fixed URL and rotates them within a
//! stated 24h window. This cache holds one immutable snapshot of the
//! directory with a TTL well inside that window and refreshes it on demand:
//! a miss takes a single process-wide lock, re-checks the snapshot after
//! acquisition, and issues at most one fetch. Readers of a fresh snapshot
//! never touch the refresh lock.
//!
//! Fetch and parse failures are logged and swallowed; nothing is cached on
//! that path, so the next lookup retries. Misses are never negative-cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::KeyDirectoryConfig;
use crate::error::{Result, RewardgateError};

/// Source of verification-key material, keyed by the directory's key id
///
/// This is the seam the signature verifier consumes. [`KeyDirectoryCache`]
/// is the production implementation; tests substitute a fixed map.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Resolve the DER-encoded public key for `key_id`, refreshing any
    /// backing cache if needed. `None` means the key is unknown.
    async fn key(&self, key_id: i64) -> Option<Vec<u8>>;
}

/// One immutable snapshot of the remote key directory
///
/// Replaced wholesale behind an `Arc` on refresh, never edited in place, so
/// concurrent readers always observe a consistent key set.
#[derive(Debug)]
pub struct CachedKeySet {
    keys: HashMap<i64, Vec<u8>>,
    expires_at: Instant,
}

impl CachedKeySet {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct KeyDirectoryResponse {
    keys: Vec<KeyDirectoryEntry>,
}

/// Entry as published by the network; only `keyId` and `base64` are consumed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyDirectoryEntry {
    key_id: i64,
    base64: String,
}

/// TTL-expiring, single-flight cache over the network's key directory
pub struct KeyDirectoryCache {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<CachedKeySet>>>,
    /// Serializes refreshes so at most one fetch is in flight
    refresh_lock: Mutex<()>,
}

impl KeyDirectoryCache {
    pub fn new(config: &KeyDirectoryConfig) -> Result<Self> {
        Self::with_ttl(config, Duration::from_secs(config.cache_ttl_hours * 3600))
    }

    /// Create a cache with an explicit snapshot TTL
    pub fn with_ttl(config: &KeyDirectoryConfig, ttl: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|err| {
                RewardgateError::internal(format!("could not build key fetch client: {}", err))
            })?;

        Ok(Self {
            http,
            url: config.url.clone(),
            ttl,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Resolve the public-key material for `key_id`
    ///
    /// A stale or empty cache triggers one refresh attempt. A fresh cache
    /// that simply lacks the key id does not refetch inside the TTL window.
    pub async fn get(&self, key_id: i64) -> Option<Vec<u8>> {
        let snapshot = match self.fresh_snapshot().await {
            Some(snapshot) if snapshot.keys.contains_key(&key_id) => snapshot,
            _ => {
                tracing::info!(key_id, "verification key not cached, refreshing directory");
                self.refresh().await?
            }
        };

        match snapshot.keys.get(&key_id) {
            Some(material) => Some(material.clone()),
            None => {
                tracing::warn!(key_id, "verification key not found after refresh");
                None
            }
        }
    }

    /// Drop the current snapshot and fetch a new one immediately
    pub async fn force_refresh(&self) {
        tracing::info!("forcing refresh of verification key directory");
        self.snapshot.write().await.take();
        let _ = self.refresh().await;
    }

    async fn fresh_snapshot(&self) -> Option<Arc<CachedKeySet>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.is_fresh())
            .cloned()
    }

    /// Refresh path: single-flight with a check-after-acquire, so concurrent
    /// misses collapse into one fetch.
    async fn refresh(&self) -> Option<Arc<CachedKeySet>> {
        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited for the lock.
        if let Some(snapshot) = self.fresh_snapshot().await {
            tracing::debug!("key directory already refreshed while waiting for lock");
            return Some(snapshot);
        }

        match self.fetch_directory().await {
            Ok(keys) => {
                let snapshot = Arc::new(keys);
                *self.snapshot.write().await = Some(snapshot.clone());
                tracing::info!(count = snapshot.len(), "fetched and cached verification keys");
                Some(snapshot)
            }
            Err(err) => {
                // Nothing cached: the next lookup retries the fetch.
                tracing::error!(error = %err, "failed to refresh verification key directory");
                None
            }
        }
    }

    async fn fetch_directory(&self) -> Result<CachedKeySet> {
        tracing::info!(url = %self.url, "fetching verification keys");

        let response = self.http.get(&self.url).send().await?.error_for_status()?;
        let directory: KeyDirectoryResponse = response.json().await?;

        if directory.keys.is_empty() {
            return Err(RewardgateError::key_fetch("key directory returned no keys"));
        }

        let mut keys = HashMap::with_capacity(directory.keys.len());
        for entry in directory.keys {
            match BASE64_STANDARD.decode(&entry.base64) {
                Ok(material) => {
                    keys.insert(entry.key_id, material);
                }
                Err(_) => {
                    tracing::warn!(key_id = entry.key_id, "skipping key with undecodable material");
                }
            }
        }
        if keys.is_empty() {
            return Err(RewardgateError::key_fetch(
                "no usable keys in directory response",
            ));
        }

        Ok(CachedKeySet {
            keys,
            expires_at: Instant::now() + self.ttl,
        })
    }
}

#[async_trait]
impl KeySource for KeyDirectoryCache {
    async fn key(&self, key_id: i64) -> Option<Vec<u8>> {
        self.get(key_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_response_parses_published_shape() {
        let json = r#"{
            "keys": [
                {"keyId": 3335741209, "pem": "-----BEGIN PUBLIC KEY-----...", "base64": "QUJD"},
                {"keyId": 7, "pem": "", "base64": "REVG"}
            ]
        }"#;

        let directory: KeyDirectoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(directory.keys.len(), 2);
        assert_eq!(directory.keys[0].key_id, 3335741209);
        assert_eq!(directory.keys[0].base64, "QUJD");
        assert_eq!(directory.keys[1].key_id, 7);
    }

    #[test]
    fn test_snapshot_freshness() {
        let fresh = CachedKeySet {
            keys: HashMap::new(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        assert!(fresh.is_fresh());

        let stale = CachedKeySet {
            keys: HashMap::new(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(!stale.is_fresh());
    }

    #[tokio::test]
    async fn test_unreachable_directory_yields_not_found() {
        // Nothing listens on this port; the fetch fails and the lookup
        // reduces to a miss rather than an error.
        let config = KeyDirectoryConfig {
            url: "http://127.0.0.1:9/keys.json".to_string(),
            fetch_timeout_secs: 1,
            cache_ttl_hours: 1,
        };
        let cache = KeyDirectoryCache::new(&config).unwrap();

        assert_eq!(cache.get(7).await, None);
    }
}
