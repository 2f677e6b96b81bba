//! List and hash primitives. None of these set an expiration; callers
//! that need one follow up with `CacheManager::update_ttl`.

use super::CacheManager;
use crate::error::{StoreError, StoreResult};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tracing::debug;

impl CacheManager {
    /// Append values to the tail of a list, returns the new length
    pub async fn push_to_list<T>(&self, key: &str, values: &[T], namespace: Option<&str>) -> StoreResult<u64>
    where
        T: Serialize,
    {
        let full_key = self.keys.full_key(key, namespace)?;
        let serialized = values
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        if serialized.is_empty() {
            return Err(StoreError::InvalidArgument(
                "push_to_list requires at least one value".to_string(),
            ));
        }

        debug!("Appending {} values to list {}", serialized.len(), full_key);

        self.backend
            .rpush(&full_key, serialized)
            .await
            .inspect_err(|e| self.record_failure("push_to_list", &full_key, namespace, e))
    }

    /// Read the inclusive range `start..=end`; `end = -1` reads to the end
    pub async fn get_list<T>(&self, key: &str, start: i64, end: i64, namespace: Option<&str>) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let full_key = self.keys.full_key(key, namespace)?;
        let raw = self.backend
            .lrange(&full_key, start, end)
            .await
            .inspect_err(|e| self.record_failure("get_list", &full_key, namespace, e))?;

        raw.iter()
            .map(|item| -> StoreResult<T> { Ok(serde_json::from_str(item)?) })
            .collect()
    }

    /// Push a value to the head of a list and trim the list to `max_len` entries
    pub async fn push_front_capped<T>(&self, key: &str, value: &T, max_len: usize, namespace: Option<&str>) -> StoreResult<u64>
    where
        T: Serialize + ?Sized,
    {
        if max_len == 0 {
            return Err(StoreError::InvalidArgument("max_len must be greater than 0".to_string()));
        }

        let full_key = self.keys.full_key(key, namespace)?;
        let serialized = serde_json::to_string(value)?;

        let pushed = self.backend
            .lpush(&full_key, serialized)
            .await
            .inspect_err(|e| self.record_failure("push_front_capped", &full_key, namespace, e))?;

        self.backend
            .ltrim(&full_key, 0, max_len as i64 - 1)
            .await
            .inspect_err(|e| self.record_failure("push_front_capped", &full_key, namespace, e))?;

        Ok(pushed.min(max_len as u64))
    }

    /// Remove every occurrence of `value` from a list, returns how many were removed
    pub async fn remove_from_list<T>(&self, key: &str, value: &T, namespace: Option<&str>) -> StoreResult<u64>
    where
        T: Serialize + ?Sized,
    {
        let full_key = self.keys.full_key(key, namespace)?;
        let serialized = serde_json::to_string(value)?;

        self.backend
            .lrem(&full_key, 0, &serialized)
            .await
            .inspect_err(|e| self.record_failure("remove_from_list", &full_key, namespace, e))
    }

    /// Set several hash fields, each value serialized independently
    pub async fn set_hash<V>(&self, key: &str, fields: &HashMap<String, V>, namespace: Option<&str>) -> StoreResult<()>
    where
        V: Serialize,
    {
        if fields.is_empty() {
            return Ok(());
        }

        let full_key = self.keys.full_key(key, namespace)?;
        let serialized = fields
            .iter()
            .map(|(field, value)| -> StoreResult<(String, Vec<u8>)> {
                Ok((field.clone(), serde_json::to_vec(value)?))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        debug!("Setting {} fields on hash {}", serialized.len(), full_key);

        self.backend
            .hset(&full_key, serialized)
            .await
            .inspect_err(|e| self.record_failure("set_hash", &full_key, namespace, e))?;
        Ok(())
    }

    /// Read every field of a hash; `None` when the hash has no fields
    pub async fn get_hash<V>(&self, key: &str, namespace: Option<&str>) -> StoreResult<Option<HashMap<String, V>>>
    where
        V: DeserializeOwned,
    {
        let full_key = self.keys.full_key(key, namespace)?;
        let raw = self.backend
            .hgetall(&full_key)
            .await
            .inspect_err(|e| self.record_failure("get_hash", &full_key, namespace, e))?;

        if raw.is_empty() {
            return Ok(None);
        }

        let fields = raw
            .iter()
            .map(|(field, value)| -> StoreResult<(String, V)> {
                Ok((field.clone(), serde_json::from_slice(value)?))
            })
            .collect::<StoreResult<HashMap<_, _>>>()?;
        Ok(Some(fields))
    }
}
