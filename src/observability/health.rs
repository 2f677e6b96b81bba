use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use crate::observability::MetricsRegistry;
use crate::store::CacheBackend;

/// Upper bound on a single store health check
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status of the backing store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub last_check: chrono::DateTime<chrono::Utc>,
    pub message: Option<String>,
    pub response_time_ms: Option<f64>,
}

/// Overall health status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Liveness check for the key-value store
#[derive(Clone)]
pub struct HealthMonitor {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    metrics: Option<MetricsRegistry>,
}

impl HealthMonitor {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_HEALTH_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record check outcomes in `store_up` and `health_check_duration_seconds`
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Round-trip PING. Never fails: any error or timeout yields `false`.
    pub async fn health_check(&self) -> bool {
        self.check().await.status != HealthStatus::Unhealthy
    }

    /// Ping the store and describe the outcome
    pub async fn check(&self) -> ComponentHealth {
        let start = Instant::now();

        let (status, message, response_time_ms) =
            match tokio::time::timeout(self.timeout, self.backend.ping()).await {
                Ok(Ok(())) => {
                    let duration = start.elapsed().as_secs_f64() * 1000.0;
                    debug!("Store health check passed in {:.2}ms", duration);
                    // answered, but close to the deadline
                    if start.elapsed() > self.timeout / 2 {
                        (HealthStatus::Degraded, Some("Store ping is slow".to_string()), Some(duration))
                    } else {
                        (HealthStatus::Healthy, None, Some(duration))
                    }
                }
                Ok(Err(e)) => {
                    warn!("Store health check failed: {}", e);
                    (HealthStatus::Unhealthy, Some(format!("Store ping failed: {}", e)), None)
                }
                Err(_) => {
                    warn!("Store health check timed out after {:?}", self.timeout);
                    (
                        HealthStatus::Unhealthy,
                        Some(format!("Store ping timed out after {}ms", self.timeout.as_millis())),
                        None,
                    )
                }
            };

        if let Some(metrics) = &self.metrics {
            metrics.metrics.health_check_duration_seconds.observe(start.elapsed().as_secs_f64());
            metrics.metrics.store_up.set(if status == HealthStatus::Unhealthy { 0.0 } else { 1.0 });
        }

        ComponentHealth {
            status,
            last_check: chrono::Utc::now(),
            message,
            response_time_ms,
        }
    }
}
