//! Per-issuer key set cache.
//!
//! Holds the most recently fetched JWKS and when it was stored. A set older
//! than the TTL reads as a miss, exactly like an empty cache, so callers have
//! a single "go fetch" signal.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedKeys {
    keys: JwkSet,
    set_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.set_at.elapsed() <= ttl
    }
}

/// Thread-safe cache of one issuer's key set.
pub struct KeyCache {
    ttl: Duration,
    entry: RwLock<Option<CachedKeys>>,
}

impl KeyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Keys whose `kid` equals `kid`.
    ///
    /// Returns `None` when nothing has been stored yet or the stored set has
    /// expired. Returns `Some` (possibly empty) for a fresh set.
    pub async fn get(&self, kid: &str) -> Option<Vec<Jwk>> {
        let entry = self.entry.read().await;
        let cached = entry.as_ref().filter(|c| c.is_fresh(self.ttl))?;
        Some(keys_with_kid(&cached.keys, kid))
    }

    /// Replace the stored set and reset its age.
    pub async fn put(&self, keys: JwkSet) {
        let mut entry = self.entry.write().await;
        *entry = Some(CachedKeys {
            keys,
            set_at: Instant::now(),
        });
    }

    /// Whether a non-expired set is stored.
    pub async fn is_fresh(&self) -> bool {
        self.entry
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.is_fresh(self.ttl))
    }
}

/// Every key in `keys` whose `kid` equals `kid`.
pub fn keys_with_kid(keys: &JwkSet, kid: &str) -> Vec<Jwk> {
    keys.keys
        .iter()
        .filter(|k| k.common.key_id.as_deref() == Some(kid))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key_set(kids: &[&str]) -> JwkSet {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| {
                json!({
                    "kty": "OKP",
                    "crv": "Ed25519",
                    "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
                    "kid": kid,
                    "alg": "EdDSA",
                    "use": "sig",
                })
            })
            .collect();
        serde_json::from_value(json!({ "keys": keys })).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cache_is_miss() {
        let cache = KeyCache::new(Duration::from_secs(60));
        assert!(cache.get("key-01").await.is_none());
        assert!(!cache.is_fresh().await);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache.put(key_set(&["key-01", "key-02", "key-01"])).await;

        let keys = cache.get("key-01").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys
            .iter()
            .all(|k| k.common.key_id.as_deref() == Some("key-01")));
        assert!(cache.is_fresh().await);
    }

    #[tokio::test]
    async fn test_unknown_kid_in_fresh_set_is_empty_not_miss() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache.put(key_set(&["key-01"])).await;

        assert_eq!(cache.get("other").await.map(|k| k.len()), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_set_is_miss() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache.put(key_set(&["key-01"])).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get("key-01").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("key-01").await.is_none());
        assert!(!cache.is_fresh().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_resets_age() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache.put(key_set(&["key-01"])).await;
        tokio::time::advance(Duration::from_secs(45)).await;

        cache.put(key_set(&["key-01"])).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(cache.is_fresh().await);
    }

    #[test]
    fn test_keys_with_kid_filters_set() {
        let set = key_set(&["a", "b", "a"]);
        assert_eq!(keys_with_kid(&set, "a").len(), 2);
        assert!(keys_with_kid(&set, "c").is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_set() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache.put(key_set(&["old"])).await;
        cache.put(key_set(&["new"])).await;

        assert_eq!(cache.get("old").await.map(|k| k.len()), Some(0));
        assert_eq!(cache.get("new").await.map(|k| k.len()), Some(1));
    }
}
