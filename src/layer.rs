/// Composition root
///
/// Wires one shared store connection into every cache-layer component.

use crate::cache::{CacheManager, KeyNamespacer};
use crate::config::Config;
use crate::context::ConversationContextStore;
use crate::error::StoreResult;
use crate::observability::{HealthMonitor, MetricsRegistry};
use crate::store::{CacheBackend, RedisBackend};
use crate::vector::VectorIndex;
use std::sync::Arc;
use tracing::{error, info};

/// All cache-layer components over a single backing store
pub struct CacheLayer {
    cache: Arc<CacheManager>,
    contexts: ConversationContextStore,
    vectors: Option<VectorIndex>,
    health: HealthMonitor,
    metrics: MetricsRegistry,
    redis: Option<Arc<RedisBackend>>,
}

impl CacheLayer {
    /// Open the Redis connection described by `config` and build every component on it
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let redis = Arc::new(RedisBackend::connect(&config.redis).await?);
        let mut layer = Self::new(config, redis.clone()).await?;
        layer.redis = Some(redis);
        Ok(layer)
    }

    /// Build every component on an existing backend.
    /// A vector index that cannot be initialized leaves `vectors()` empty.
    pub async fn new(config: &Config, backend: Arc<dyn CacheBackend>) -> StoreResult<Self> {
        let keys = KeyNamespacer::new(config.redis.key_prefix.clone());
        let metrics = MetricsRegistry::new()?;

        let cache = Arc::new(CacheManager::new(
            backend.clone(),
            keys.clone(),
            config.redis.default_ttl_secs,
        ));
        let contexts = ConversationContextStore::new(cache.clone());
        let health = HealthMonitor::new(backend.clone()).with_metrics(metrics.clone());

        let vectors = match VectorIndex::new(backend, keys, &config.vector).await {
            Ok(index) => Some(index),
            Err(e) => {
                error!("Vector index unavailable, similarity search disabled: {}", e);
                None
            }
        };

        info!(
            "Cache layer ready (prefix {}, vector index {})",
            config.redis.key_prefix,
            if vectors.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            cache,
            contexts,
            vectors,
            health,
            metrics,
            redis: None,
        })
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn contexts(&self) -> &ConversationContextStore {
        &self.contexts
    }

    pub fn vectors(&self) -> Option<&VectorIndex> {
        self.vectors.as_ref()
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Prometheus exposition of the current cache and health metrics
    pub fn metrics_text(&self) -> StoreResult<String> {
        self.metrics.observe_cache_stats(&self.cache.stats());
        self.metrics.gather()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Close the Redis connection, if this layer opened one
    pub async fn shutdown(&self) -> StoreResult<()> {
        if let Some(redis) = &self.redis {
            redis.disconnect().await?;
        }
        Ok(())
    }
}
