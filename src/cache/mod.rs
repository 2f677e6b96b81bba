/// Caching module
///
/// Namespaced scalar entries with expiration, plus list and hash
/// primitives (see `collections`). Every key goes through `KeyNamespacer`.

mod collections;
mod keys;


use crate::error::{StoreError, StoreResult};
use crate::store::CacheBackend;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

pub use keys::{
    KeyNamespacer, ACTIVE_CONVERSATIONS_NAMESPACE, CONTEXT_NAMESPACE, VECTOR_NAMESPACE,
};

/// Options for `CacheManager::set`
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Namespace of the key; `None` is the root namespace
    pub namespace: Option<String>,
    /// Seconds to live; `None` applies the default, `<= 0` stores without expiry
    pub ttl_secs: Option<i64>,
}

impl CacheOptions {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// Store without expiration
    pub fn persistent(self) -> Self {
        self.ttl(0)
    }
}

/// Cache manager over the shared backing store
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    keys: KeyNamespacer,
    default_ttl_secs: u64,
    stats: Arc<CacheStatsInternal>,
}

/// Internal cache statistics with atomic counters for thread safety
#[derive(Debug, Default)]
struct CacheStatsInternal {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    keys_cleared: AtomicU64,
}

/// Cache statistics for monitoring hit/miss ratios
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Store failures surfaced to callers
    pub errors: u64,
    pub keys_cleared: u64,
}

impl CacheStats {
    /// Calculate hit ratio of `get` calls
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheManager {
    pub fn new(backend: Arc<dyn CacheBackend>, keys: KeyNamespacer, default_ttl_secs: u64) -> Self {
        CacheManager {
            backend,
            keys,
            default_ttl_secs,
            stats: Arc::new(CacheStatsInternal::default()),
        }
    }

    pub fn keys(&self) -> &KeyNamespacer {
        &self.keys
    }

    /// Serialize `value` and store it, overwriting any previous value
    pub async fn set<T>(&self, key: &str, value: &T, options: CacheOptions) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let namespace = options.namespace.as_deref();
        let full_key = self.keys.full_key(key, namespace)?;
        let serialized = serde_json::to_string(value)?;

        let ttl = options.ttl_secs.unwrap_or(self.default_ttl_secs as i64);
        let expiration = if ttl > 0 { Some(ttl as u64) } else { None };

        debug!(key = %full_key, ttl = ?expiration, "Caching value");

        self.backend
            .set(&full_key, serialized, expiration)
            .await
            .inspect_err(|e| self.record_failure("set", &full_key, namespace, e))
    }

    /// Fetch and deserialize; `None` when the key is absent or expired
    pub async fn get<T>(&self, key: &str, namespace: Option<&str>) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let full_key = self.keys.full_key(key, namespace)?;

        let result = self.backend
            .get(&full_key)
            .await
            .inspect_err(|e| self.record_failure("get", &full_key, namespace, e))?;

        match result {
            Some(serialized) => {
                let value = serde_json::from_str(&serialized)
                    .map_err(StoreError::from)
                    .inspect_err(|e| self.record_failure("get", &full_key, namespace, e))?;
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for key: {}", full_key);
                Ok(Some(value))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for key: {}", full_key);
                Ok(None)
            }
        }
    }

    /// Remove a key, returns whether it existed
    pub async fn delete(&self, key: &str, namespace: Option<&str>) -> StoreResult<bool> {
        let full_key = self.keys.full_key(key, namespace)?;
        let deleted = self.backend
            .del(vec![full_key.clone()])
            .await
            .inspect_err(|e| self.record_failure("delete", &full_key, namespace, e))?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, key: &str, namespace: Option<&str>) -> StoreResult<bool> {
        let full_key = self.keys.full_key(key, namespace)?;
        self.backend
            .exists(&full_key)
            .await
            .inspect_err(|e| self.record_failure("exists", &full_key, namespace, e))
    }

    /// Remaining seconds, -1 without expiry, -2 when absent
    pub async fn get_ttl(&self, key: &str, namespace: Option<&str>) -> StoreResult<i64> {
        let full_key = self.keys.full_key(key, namespace)?;
        self.backend
            .ttl(&full_key)
            .await
            .inspect_err(|e| self.record_failure("get_ttl", &full_key, namespace, e))
    }

    /// Reset the expiration; `ttl_secs <= 0` removes it.
    /// Returns false when the key does not exist.
    pub async fn update_ttl(&self, key: &str, ttl_secs: i64, namespace: Option<&str>) -> StoreResult<bool> {
        let full_key = self.keys.full_key(key, namespace)?;

        let result = if ttl_secs > 0 {
            self.backend.expire(&full_key, ttl_secs).await
        } else {
            // PERSIST reports false both for "absent" and "already persistent"
            match self.backend.persist(&full_key).await {
                Ok(true) => Ok(true),
                Ok(false) => self.backend.exists(&full_key).await,
                Err(e) => Err(e),
            }
        };

        result.inspect_err(|e| self.record_failure("update_ttl", &full_key, namespace, e))
    }

    /// Delete every key in `namespace`, or every key under the prefix.
    /// Returns the number of keys removed.
    pub async fn clear(&self, namespace: Option<&str>) -> StoreResult<u64> {
        let pattern = self.keys.pattern(namespace)?;

        let keys = self.backend
            .keys(&pattern)
            .await
            .inspect_err(|e| self.record_failure("clear", &pattern, namespace, e))?;

        if keys.is_empty() {
            debug!("Nothing to clear for pattern: {}", pattern);
            return Ok(0);
        }

        let deleted = self.backend
            .del(keys)
            .await
            .inspect_err(|e| self.record_failure("clear", &pattern, namespace, e))?;

        self.stats.keys_cleared.fetch_add(deleted, Ordering::Relaxed);
        info!("Cleared {} cache entries matching {}", deleted, pattern);
        Ok(deleted)
    }

    /// Get cache hit/miss statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            keys_cleared: self.stats.keys_cleared.load(Ordering::Relaxed),
        }
    }

    /// Reset cache statistics (useful for testing)
    pub fn reset_stats(&self) {
        self.stats.hits.store(0, Ordering::Relaxed);
        self.stats.misses.store(0, Ordering::Relaxed);
        self.stats.errors.store(0, Ordering::Relaxed);
        self.stats.keys_cleared.store(0, Ordering::Relaxed);
    }

    fn record_failure(
        &self,
        operation: &str,
        key: &str,
        namespace: Option<&str>,
        err: &StoreError,
    ) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        error!(operation, key, namespace = namespace.unwrap_or("-"), "Cache operation failed: {}", err);
    }
}
