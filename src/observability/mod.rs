pub mod health;
pub mod metrics;

pub use health::{ComponentHealth, HealthMonitor, HealthStatus, DEFAULT_HEALTH_TIMEOUT};
pub use metrics::{Metrics, MetricsRegistry};

use tracing::subscriber::set_global_default;
use tracing_subscriber::{
    fmt::{self, format::JsonFields},
    layer::SubscriberExt,
    EnvFilter, Registry,
};
use crate::error::{StoreError, StoreResult};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,context_cache=debug";

/// Initialize global tracing subscriber with JSON formatting
pub fn init_tracing() -> StoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let formatting_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(true)
        .fmt_fields(JsonFields::new());

    let subscriber = Registry::default()
        .with(env_filter)
        .with(formatting_layer);

    set_global_default(subscriber)
        .map_err(|e| StoreError::Internal(format!("Failed to set global subscriber: {}", e)))?;

    Ok(())
}
