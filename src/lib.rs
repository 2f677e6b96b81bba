pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod layer;
pub mod observability;
pub mod store;
pub mod types;
pub mod vector;

pub use error::{StoreError, StoreResult};
pub use types::*;
pub use config::{Config, RedisConfig, VectorIndexConfig};
pub use cache::{CacheManager, CacheOptions, CacheStats, KeyNamespacer};
pub use context::ConversationContextStore;
pub use layer::CacheLayer;
pub use observability::{HealthMonitor, HealthStatus, MetricsRegistry};
pub use store::{CacheBackend, MemoryBackend, RedisBackend};
pub use vector::{VectorIndex, VectorMatch, VectorRecord};
