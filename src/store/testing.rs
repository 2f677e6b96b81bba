use crate::error::{StoreError, StoreResult};
use crate::store::{CacheBackend, KnnHit, VectorIndexSchema};
use async_trait::async_trait;
use std::collections::HashMap;

/// Backend whose every command fails as if Redis were unreachable
pub(crate) struct FailingBackend;

/// Backend whose every command hangs as if Redis never answered
pub(crate) struct StalledBackend;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Redis("connection refused".to_string()))
}

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        unavailable()
    }

    async fn set(&self, _key: &str, _value: String, _ttl_secs: Option<u64>) -> StoreResult<()> {
        unavailable()
    }

    async fn del(&self, _keys: Vec<String>) -> StoreResult<u64> {
        unavailable()
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        unavailable()
    }

    async fn ttl(&self, _key: &str) -> StoreResult<i64> {
        unavailable()
    }

    async fn expire(&self, _key: &str, _seconds: i64) -> StoreResult<bool> {
        unavailable()
    }

    async fn persist(&self, _key: &str) -> StoreResult<bool> {
        unavailable()
    }

    async fn keys(&self, _pattern: &str) -> StoreResult<Vec<String>> {
        unavailable()
    }

    async fn rpush(&self, _key: &str, _values: Vec<String>) -> StoreResult<u64> {
        unavailable()
    }

    async fn lpush(&self, _key: &str, _value: String) -> StoreResult<u64> {
        unavailable()
    }

    async fn lrange(&self, _key: &str, _start: i64, _stop: i64) -> StoreResult<Vec<String>> {
        unavailable()
    }

    async fn ltrim(&self, _key: &str, _start: i64, _stop: i64) -> StoreResult<()> {
        unavailable()
    }

    async fn lrem(&self, _key: &str, _count: i64, _value: &str) -> StoreResult<u64> {
        unavailable()
    }

    async fn hset(&self, _key: &str, _fields: Vec<(String, Vec<u8>)>) -> StoreResult<u64> {
        unavailable()
    }

    async fn hset_existing(&self, _key: &str, _fields: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        unavailable()
    }

    async fn hgetall(&self, _key: &str) -> StoreResult<HashMap<String, Vec<u8>>> {
        unavailable()
    }

    async fn ping(&self) -> StoreResult<()> {
        unavailable()
    }

    async fn index_exists(&self, _name: &str) -> StoreResult<bool> {
        unavailable()
    }

    async fn create_vector_index(&self, _schema: &VectorIndexSchema) -> StoreResult<()> {
        unavailable()
    }

    async fn knn_search(&self, _index: &str, _query: &[u8], _k: usize) -> StoreResult<Vec<KnnHit>> {
        unavailable()
    }
}

#[async_trait]
impl CacheBackend for StalledBackend {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: String, _ttl_secs: Option<u64>) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn del(&self, _keys: Vec<String>) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn ttl(&self, _key: &str) -> StoreResult<i64> {
        std::future::pending().await
    }

    async fn expire(&self, _key: &str, _seconds: i64) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn persist(&self, _key: &str) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn keys(&self, _pattern: &str) -> StoreResult<Vec<String>> {
        std::future::pending().await
    }

    async fn rpush(&self, _key: &str, _values: Vec<String>) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn lpush(&self, _key: &str, _value: String) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn lrange(&self, _key: &str, _start: i64, _stop: i64) -> StoreResult<Vec<String>> {
        std::future::pending().await
    }

    async fn ltrim(&self, _key: &str, _start: i64, _stop: i64) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn lrem(&self, _key: &str, _count: i64, _value: &str) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn hset(&self, _key: &str, _fields: Vec<(String, Vec<u8>)>) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn hset_existing(&self, _key: &str, _fields: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn hgetall(&self, _key: &str) -> StoreResult<HashMap<String, Vec<u8>>> {
        std::future::pending().await
    }

    async fn ping(&self) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn index_exists(&self, _name: &str) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn create_vector_index(&self, _schema: &VectorIndexSchema) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn knn_search(&self, _index: &str, _query: &[u8], _k: usize) -> StoreResult<Vec<KnnHit>> {
        std::future::pending().await
    }
}
