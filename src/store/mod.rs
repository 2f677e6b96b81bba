/// Backing store module
///
/// Every component reaches the key-value store through the `CacheBackend`
/// trait. `RedisBackend` talks to a real Redis (with the RediSearch module
/// for vector queries); `MemoryBackend` reproduces the same command
/// semantics in-process.

mod memory;
mod redis_backend;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

/// Hash field holding the packed float32 vector
pub const VECTOR_FIELD: &str = "vector";
/// Hash field holding the serialized metadata payload
pub const METADATA_FIELD: &str = "metadata";

/// Schema of the vector search index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndexSchema {
    /// Index name
    pub name: String,
    /// Only hashes whose key starts with this prefix are indexed
    pub key_prefix: String,
    /// Number of float32 components per vector
    pub dimension: usize,
}

/// Raw KNN hit as reported by the store
#[derive(Debug, Clone, PartialEq)]
pub struct KnnHit {
    /// Fully qualified key of the matching hash
    pub key: String,
    /// Cosine distance (0 = identical direction, 2 = opposite)
    pub distance: f32,
    /// Raw metadata field, if the hash has one
    pub metadata: Option<String>,
}

/// Command surface of the key-value store
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// GET
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// SET, with EX when `ttl_secs` is given
    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()>;

    /// DEL, returns the number of keys removed
    async fn del(&self, keys: Vec<String>) -> StoreResult<u64>;

    /// EXISTS
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// TTL: seconds remaining, -1 without expiry, -2 when absent
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// EXPIRE, returns false when the key does not exist
    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool>;

    /// PERSIST, returns false when nothing changed
    async fn persist(&self, key: &str) -> StoreResult<bool>;

    /// KEYS with a glob pattern
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// RPUSH, returns the new list length
    async fn rpush(&self, key: &str, values: Vec<String>) -> StoreResult<u64>;

    /// LPUSH, returns the new list length
    async fn lpush(&self, key: &str, value: String) -> StoreResult<u64>;

    /// LRANGE with inclusive, possibly negative, bounds
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    /// LTRIM with inclusive, possibly negative, bounds
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()>;

    /// LREM, `count == 0` removes every occurrence
    async fn lrem(&self, key: &str, count: i64, value: &str) -> StoreResult<u64>;

    /// HSET with binary-safe values, returns the number of new fields
    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<u64>;

    /// HSET only when the key already exists, checked and written atomically.
    /// Returns false, writing nothing, when the key is absent.
    async fn hset_existing(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<bool>;

    /// HGETALL with binary-safe values
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, Vec<u8>>>;

    /// PING
    async fn ping(&self) -> StoreResult<()>;

    /// FT.INFO, mapped to an existence check
    async fn index_exists(&self, name: &str) -> StoreResult<bool>;

    /// FT.CREATE for a cosine HNSW index over `VECTOR_FIELD` plus a text `METADATA_FIELD`
    async fn create_vector_index(&self, schema: &VectorIndexSchema) -> StoreResult<()>;

    /// FT.SEARCH KNN query, nearest first
    async fn knn_search(&self, index: &str, query: &[u8], k: usize) -> StoreResult<Vec<KnnHit>>;
}
