use crate::config::RedisConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{CacheBackend, KnnHit, VectorIndexSchema, METADATA_FIELD, VECTOR_FIELD};
use async_trait::async_trait;
use fred::{
    bytes::Bytes,
    clients::RedisPool,
    cmd,
    interfaces::{ClientLike, HashesInterface, KeysInterface, ListInterface, LuaInterface},
    types::{Builder, Expiration, RedisConfig as FredRedisConfig, RedisValue},
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HSET the ARGV field/value pairs only if KEYS[1] exists
const HSET_EXISTING_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
"#;

/// Redis-backed store sharing one connection pool across all callers
pub struct RedisBackend {
    /// Fred Redis client with connection pooling
    client: RedisPool,
}

impl RedisBackend {
    /// Connect to Redis and wait until the pool is ready
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        info!("Initializing Redis client with URL: {}", config.redacted_url());

        let redis_config = FredRedisConfig::from_url(&config.connection_url()?)
            .map_err(|e| StoreError::Redis(format!("Invalid Redis URL: {}", e)))?;

        let timeout_secs = config.connection_timeout_secs;
        let client = Builder::from_config(redis_config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(timeout_secs);
            })
            .with_performance_config(|perf_config| {
                perf_config.auto_pipeline = true;
                perf_config.default_command_timeout = Duration::from_secs(timeout_secs);
            })
            .build_pool(config.max_connections as usize)
            .map_err(|e| StoreError::Redis(format!("Failed to create Redis pool: {}", e)))?;

        // The returned handle only tracks the background reconnect task
        let _connection_task = client
            .init()
            .await
            .map_err(|e| StoreError::Redis(format!("Failed to connect to Redis: {}", e)))?;

        info!("Redis client connected successfully");

        Ok(RedisBackend { client })
    }

    /// Close every pooled connection
    pub async fn disconnect(&self) -> StoreResult<()> {
        self.client
            .quit()
            .await
            .map_err(|e| StoreError::Redis(format!("Failed to close Redis connection: {}", e)))?;
        info!("Redis client disconnected");
        Ok(())
    }
}

fn redis_err(operation: &str, key: &str, e: fred::error::RedisError) -> StoreError {
    StoreError::Redis(format!("{} failed for key {}: {}", operation, key, e))
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.client
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| redis_err("GET", key, e))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()> {
        let expiration = ttl_secs.map(|ttl| Expiration::EX(ttl as i64));
        let _: () = self.client
            .set(key, value, expiration, None, false)
            .await
            .map_err(|e| redis_err("SET", key, e))?;
        Ok(())
    }

    async fn del(&self, keys: Vec<String>) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let label = keys.first().cloned().unwrap_or_default();
        let deleted: i64 = self.client
            .del(keys)
            .await
            .map_err(|e| redis_err("DEL", &label, e))?;
        Ok(deleted.max(0) as u64)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let count: i64 = self.client
            .exists(key)
            .await
            .map_err(|e| redis_err("EXISTS", key, e))?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        self.client
            .ttl::<i64, _>(key)
            .await
            .map_err(|e| redis_err("TTL", key, e))
    }

    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool> {
        let updated: i64 = self.client
            .expire(key, seconds)
            .await
            .map_err(|e| redis_err("EXPIRE", key, e))?;
        Ok(updated == 1)
    }

    async fn persist(&self, key: &str) -> StoreResult<bool> {
        let updated: i64 = self.client
            .persist(key)
            .await
            .map_err(|e| redis_err("PERSIST", key, e))?;
        Ok(updated == 1)
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.client
            .custom::<Vec<String>, _>(cmd!("KEYS"), vec![pattern])
            .await
            .map_err(|e| redis_err("KEYS", pattern, e))
    }

    async fn rpush(&self, key: &str, values: Vec<String>) -> StoreResult<u64> {
        let len: i64 = self.client
            .rpush(key, values)
            .await
            .map_err(|e| redis_err("RPUSH", key, e))?;
        Ok(len.max(0) as u64)
    }

    async fn lpush(&self, key: &str, value: String) -> StoreResult<u64> {
        let len: i64 = self.client
            .lpush(key, value)
            .await
            .map_err(|e| redis_err("LPUSH", key, e))?;
        Ok(len.max(0) as u64)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.client
            .lrange::<Vec<String>, _>(key, start, stop)
            .await
            .map_err(|e| redis_err("LRANGE", key, e))
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        let _: () = self.client
            .ltrim(key, start, stop)
            .await
            .map_err(|e| redis_err("LTRIM", key, e))?;
        Ok(())
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> StoreResult<u64> {
        let removed: i64 = self.client
            .lrem(key, count, value)
            .await
            .map_err(|e| redis_err("LREM", key, e))?;
        Ok(removed.max(0) as u64)
    }

    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<u64> {
        let values: HashMap<String, RedisValue> = fields
            .into_iter()
            .map(|(field, value)| (field, RedisValue::Bytes(Bytes::from(value))))
            .collect();

        let added: i64 = self.client
            .hset(key, values)
            .await
            .map_err(|e| redis_err("HSET", key, e))?;
        Ok(added.max(0) as u64)
    }

    async fn hset_existing(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        if fields.is_empty() {
            return self.exists(key).await;
        }
        let args: Vec<RedisValue> = fields
            .into_iter()
            .flat_map(|(field, value)| [RedisValue::from(field), RedisValue::Bytes(Bytes::from(value))])
            .collect();

        let written: i64 = self.client
            .eval(HSET_EXISTING_SCRIPT, vec![key], args)
            .await
            .map_err(|e| redis_err("EVAL HSET", key, e))?;
        Ok(written == 1)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, Vec<u8>>> {
        let raw: HashMap<String, RedisValue> = self.client
            .hgetall(key)
            .await
            .map_err(|e| redis_err("HGETALL", key, e))?;

        Ok(raw
            .into_iter()
            .map(|(field, value)| (field, value_bytes(value)))
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: String = self.client
            .ping()
            .await
            .map_err(|e| StoreError::Redis(format!("PING failed: {}", e)))?;
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> StoreResult<bool> {
        match self.client
            .custom::<RedisValue, _>(cmd!("FT.INFO"), vec![name])
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let details = e.details().to_lowercase();
                if details.contains("unknown index") || details.contains("no such index") {
                    debug!("Vector index {} does not exist yet", name);
                    Ok(false)
                } else {
                    Err(StoreError::VectorIndex(format!("FT.INFO failed for {}: {}", name, e)))
                }
            }
        }
    }

    async fn create_vector_index(&self, schema: &VectorIndexSchema) -> StoreResult<()> {
        let _: RedisValue = self.client
            .custom(cmd!("FT.CREATE"), create_index_args(schema))
            .await
            .map_err(|e| StoreError::VectorIndex(format!("FT.CREATE failed for {}: {}", schema.name, e)))?;
        Ok(())
    }

    async fn knn_search(&self, index: &str, query: &[u8], k: usize) -> StoreResult<Vec<KnnHit>> {
        let response: RedisValue = self.client
            .custom(cmd!("FT.SEARCH"), knn_search_args(index, query, k))
            .await
            .map_err(|e| StoreError::Redis(format!("FT.SEARCH failed for {}: {}", index, e)))?;

        parse_search_response(response)
    }
}

/// `FT.CREATE` arguments: cosine HNSW over `VECTOR_FIELD`, text `METADATA_FIELD`,
/// restricted to hashes under the schema's key prefix
fn create_index_args(schema: &VectorIndexSchema) -> Vec<String> {
    let dimension = schema.dimension.to_string();
    [
        schema.name.as_str(),
        "ON", "HASH",
        "PREFIX", "1", schema.key_prefix.as_str(),
        "SCHEMA",
        VECTOR_FIELD, "VECTOR", "HNSW", "6",
        "TYPE", "FLOAT32",
        "DIM", dimension.as_str(),
        "DISTANCE_METRIC", "COSINE",
        METADATA_FIELD, "TEXT",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

/// `FT.SEARCH` arguments for a `k`-nearest query, nearest first
fn knn_search_args(index: &str, query: &[u8], k: usize) -> Vec<RedisValue> {
    let query_expr = format!("*=>[KNN $K @{} $BLOB AS score]", VECTOR_FIELD);
    let k = k.to_string();
    vec![
        index.into(),
        query_expr.into(),
        "PARAMS".into(), "4".into(),
        "K".into(), k.as_str().into(),
        "BLOB".into(), RedisValue::Bytes(Bytes::copy_from_slice(query)),
        "SORTBY".into(), "score".into(),
        "RETURN".into(), "2".into(), "score".into(), METADATA_FIELD.into(),
        "LIMIT".into(), "0".into(), k.as_str().into(),
        "DIALECT".into(), "2".into(),
    ]
}

fn value_bytes(value: RedisValue) -> Vec<u8> {
    match value {
        RedisValue::Bytes(bytes) => bytes.to_vec(),
        RedisValue::String(s) => s.as_bytes().to_vec(),
        other => other.as_string().unwrap_or_default().into_bytes(),
    }
}

/// Decode a RESP2 FT.SEARCH reply: `[total, key, [field, value, ...], key, ...]`
fn parse_search_response(response: RedisValue) -> StoreResult<Vec<KnnHit>> {
    let items = match response {
        RedisValue::Array(items) => items,
        RedisValue::Null => return Ok(Vec::new()),
        other => {
            return Err(StoreError::Redis(format!(
                "Unexpected FT.SEARCH reply type: {:?}",
                other.kind()
            )))
        }
    };

    let mut hits = Vec::new();
    let mut iter = items.into_iter().skip(1);
    while let Some(key) = iter.next() {
        let key = key
            .as_string()
            .ok_or_else(|| StoreError::Redis("FT.SEARCH returned a non-string key".to_string()))?;

        let fields = match iter.next() {
            Some(RedisValue::Array(fields)) => fields,
            _ => Vec::new(),
        };

        let mut distance = None;
        let mut metadata = None;
        for pair in fields.chunks(2) {
            let name = pair[0].as_string().unwrap_or_default();
            let value = pair.get(1).and_then(|v| v.as_string());
            match name.as_str() {
                "score" => distance = value.and_then(|v| v.parse::<f32>().ok()),
                METADATA_FIELD => metadata = value,
                _ => {}
            }
        }

        match distance {
            Some(distance) => hits.push(KnnHit { key, distance, metadata }),
            None => warn!("FT.SEARCH hit {} has no score, skipping", key),
        }
    }

    Ok(hits)
}
