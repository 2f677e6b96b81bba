use prometheus::{Gauge, Histogram, HistogramOpts, Encoder, Registry, TextEncoder};
use std::sync::Arc;
use crate::cache::CacheStats;
use crate::error::{StoreError, StoreResult};

/// Prometheus metrics registry and collectors
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All cache layer metrics
pub struct Metrics {
    // Cache metrics
    pub cache_hits: Gauge,
    pub cache_misses: Gauge,
    pub cache_errors: Gauge,
    pub cache_hit_ratio: Gauge,

    // Health metrics
    pub store_up: Gauge,
    pub health_check_duration_seconds: Histogram,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all collectors
    pub fn new() -> StoreResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);

        Ok(Self { registry, metrics })
    }

    /// Copy a snapshot of the cache counters into the gauges
    pub fn observe_cache_stats(&self, stats: &CacheStats) {
        self.metrics.cache_hits.set(stats.hits as f64);
        self.metrics.cache_misses.set(stats.misses as f64);
        self.metrics.cache_errors.set(stats.errors as f64);
        self.metrics.cache_hit_ratio.set(stats.hit_ratio());
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> StoreResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)
            .map_err(|e| StoreError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| StoreError::Internal(format!("Failed to convert metrics to string: {}", e)))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Metrics {
    fn new(registry: &Registry) -> StoreResult<Self> {
        let cache_hits = gauge("cache_hits", "Cache lookups that found a value")?;
        let cache_misses = gauge("cache_misses", "Cache lookups that found nothing")?;
        let cache_errors = gauge("cache_errors", "Store failures surfaced by the cache")?;
        let cache_hit_ratio = gauge("cache_hit_ratio", "Ratio of cache hits to lookups")?;

        let store_up = gauge("store_up", "Whether the last store health check succeeded (1=up, 0=down)")?;

        let health_check_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_check_duration_seconds",
            "Duration of store health checks in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]))
        .map_err(|e| StoreError::Internal(format!("Failed to create health_check_duration_seconds metric: {}", e)))?;

        for gauge in [&cache_hits, &cache_misses, &cache_errors, &cache_hit_ratio, &store_up] {
            registry.register(Box::new(gauge.clone()))
                .map_err(|e| StoreError::Internal(format!("Failed to register gauge: {}", e)))?;
        }
        registry.register(Box::new(health_check_duration_seconds.clone()))
            .map_err(|e| StoreError::Internal(format!("Failed to register health_check_duration_seconds: {}", e)))?;

        Ok(Self {
            cache_hits,
            cache_misses,
            cache_errors,
            cache_hit_ratio,
            store_up,
            health_check_duration_seconds,
        })
    }
}

fn gauge(name: &str, help: &str) -> StoreResult<Gauge> {
    Gauge::new(name, help)
        .map_err(|e| StoreError::Internal(format!("Failed to create {} metric: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.gather().is_ok());
    }

    #[test]
    fn test_observe_cache_stats() {
        let registry = MetricsRegistry::new().unwrap();

        registry.observe_cache_stats(&CacheStats {
            hits: 3,
            misses: 1,
            errors: 2,
            keys_cleared: 0,
        });

        assert_eq!(registry.metrics.cache_hits.get(), 3.0);
        assert_eq!(registry.metrics.cache_misses.get(), 1.0);
        assert_eq!(registry.metrics.cache_errors.get(), 2.0);
        assert!((registry.metrics.cache_hit_ratio.get() - 0.75).abs() < 1e-9);

        let output = registry.gather().unwrap();
        assert!(output.contains("cache_hits 3"));
        assert!(output.contains("cache_hit_ratio 0.75"));
    }

    #[test]
    fn test_health_metrics_exposed() {
        let registry = MetricsRegistry::new().unwrap();
        registry.metrics.store_up.set(1.0);
        registry.metrics.health_check_duration_seconds.observe(0.002);

        let output = registry.gather().unwrap();
        assert!(output.contains("store_up 1"));
        assert!(output.contains("health_check_duration_seconds_count 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = MetricsRegistry::new().unwrap();
        let second = MetricsRegistry::new().unwrap();

        first.metrics.store_up.set(1.0);
        assert_eq!(second.metrics.store_up.get(), 0.0);
    }
}
