use crate::error::{StoreError, StoreResult};
use crate::store::{CacheBackend, KnnHit, VectorIndexSchema, METADATA_FIELD, VECTOR_FIELD};
use crate::vector::{cosine_similarity, decode_vector};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Hash(HashMap<String, Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    indexes: HashMap<String, VectorIndexSchema>,
}

impl Inner {
    /// Entry for `key`, dropping it first if it has expired
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).map_or(false, |e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    fn list_mut(&mut self, key: &str) -> StoreResult<&mut VecDeque<String>> {
        if self.live(key).is_none() {
            self.entries.insert(
                key.to_string(),
                Entry { value: Value::List(VecDeque::new()), expires_at: None },
            );
        }
        match self.entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::List(list)) => Ok(list),
            _ => Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
    }

    fn drop_if_empty(&mut self, key: &str) {
        let empty = match self.entries.get(key).map(|e| &e.value) {
            Some(Value::List(list)) => list.is_empty(),
            Some(Value::Hash(hash)) => hash.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }
}

/// In-process store with Redis command semantics.
///
/// Expiry is lazy and measured on the tokio clock, so paused-time tests can
/// advance past a TTL without sleeping.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();
        inner.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()> {
        let expires_at = match ttl_secs {
            Some(ttl) => Some(deadline(ttl)?),
            None => None,
        };
        let mut inner = self.inner.lock().await;
        inner.entries.insert(key.to_string(), Entry { value: Value::Str(value), expires_at });
        Ok(())
    }

    async fn del(&self, keys: Vec<String>) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut deleted = 0;
        for key in keys {
            if inner.live(&key).is_some() {
                inner.entries.remove(&key);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.live(key).is_some())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        Ok(match inner.live(key) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            // Redis rounds the remaining milliseconds to the nearest second
            Some(Entry { expires_at: Some(at), .. }) => {
                ((at.saturating_duration_since(now).as_millis() + 500) / 1000) as i64
            }
        })
    }

    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.live(key).is_none() {
            return Ok(false);
        }
        if seconds <= 0 {
            inner.entries.remove(key);
            return Ok(true);
        }
        let expires_at = deadline(seconds as u64)?;
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.expires_at = Some(expires_at);
        }
        Ok(true)
    }

    async fn persist(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            Some(entry) if entry.expires_at.is_some() => {
                entry.expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();
        let mut keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn rpush(&self, key: &str, values: Vec<String>) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let list = inner.list_mut(key)?;
        list.extend(values);
        let len = list.len() as u64;
        inner.drop_if_empty(key);
        Ok(len)
    }

    async fn lpush(&self, key: &str, value: String) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let list = inner.list_mut(key)?;
        list.push_front(value);
        Ok(list.len() as u64)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(match list_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.live(key).map(|e| &mut e.value) {
            None => return Ok(()),
            Some(Value::List(list)) => match list_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to + 1);
                    list.drain(..from);
                }
                None => list.clear(),
            },
            Some(_) => return Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
        inner.drop_if_empty(key);
        Ok(())
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let removed = match inner.live(key).map(|e| &mut e.value) {
            None => return Ok(0),
            Some(Value::List(list)) => {
                let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
                let mut removed = 0;
                if count >= 0 {
                    let mut i = 0;
                    while i < list.len() && removed < limit {
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let mut i = list.len();
                    while i > 0 && removed < limit {
                        i -= 1;
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                removed as u64
            }
            Some(_) => return Err(StoreError::Redis(WRONGTYPE.to_string())),
        };
        inner.drop_if_empty(key);
        Ok(removed)
    }

    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        if inner.live(key).is_none() {
            inner.entries.insert(
                key.to_string(),
                Entry { value: Value::Hash(HashMap::new()), expires_at: None },
            );
        }
        let hash = match inner.entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Hash(hash)) => hash,
            _ => return Err(StoreError::Redis(WRONGTYPE.to_string())),
        };
        let mut added = 0;
        for (field, value) in fields {
            if hash.insert(field, value).is_none() {
                added += 1;
            }
        }
        inner.drop_if_empty(key);
        Ok(added)
    }

    async fn hset_existing(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.live(key).map(|e| &mut e.value) {
            None => Ok(false),
            Some(Value::Hash(hash)) => {
                hash.extend(fields);
                Ok(true)
            }
            Some(_) => Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, Vec<u8>>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StoreError::Redis(WRONGTYPE.to_string())),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.indexes.contains_key(name))
    }

    async fn create_vector_index(&self, schema: &VectorIndexSchema) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.indexes.contains_key(&schema.name) {
            return Err(StoreError::VectorIndex("Index already exists".to_string()));
        }
        debug!("Created in-memory vector index {}", schema.name);
        inner.indexes.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    async fn knn_search(&self, index: &str, query: &[u8], k: usize) -> StoreResult<Vec<KnnHit>> {
        let mut inner = self.inner.lock().await;
        let schema = inner
            .indexes
            .get(index)
            .cloned()
            .ok_or_else(|| StoreError::Redis(format!("{}: no such index", index)))?;

        if query.len() != schema.dimension * 4 {
            return Err(StoreError::Redis(format!(
                "query vector blob size ({}) does not match index's expected size ({})",
                query.len(),
                schema.dimension * 4
            )));
        }
        let query = decode_vector(query)?;

        inner.purge_expired();
        let mut hits: Vec<KnnHit> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(&schema.key_prefix))
            .filter_map(|(key, entry)| match &entry.value {
                Value::Hash(hash) => {
                    // Documents with a malformed vector are not indexed
                    let stored = hash.get(VECTOR_FIELD)?;
                    if stored.len() != schema.dimension * 4 {
                        return None;
                    }
                    let stored = decode_vector(stored).ok()?;
                    Some(KnnHit {
                        key: key.clone(),
                        distance: 1.0 - cosine_similarity(&query, &stored),
                        metadata: hash
                            .get(METADATA_FIELD)
                            .map(|raw| String::from_utf8_lossy(raw).into_owned()),
                    })
                }
                _ => None,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Expiry instant `ttl_secs` from now; Redis rejects expirations it cannot represent
fn deadline(ttl_secs: u64) -> StoreResult<Instant> {
    Instant::now()
        .checked_add(Duration::from_secs(ttl_secs))
        .ok_or_else(|| StoreError::InvalidArgument(format!("invalid expire time: {}", ttl_secs)))
}

/// Resolve Redis-style inclusive list bounds into valid indices
fn list_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Redis KEYS glob: `*`, `?`, `[...]` classes with `^` and ranges, `\` escapes
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => match match_class(pattern, p, text[t]) {
                    Some((true, next)) => {
                        p = next;
                        t += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    None => {
                        if text[t] == b'[' {
                            p += 1;
                            t += 1;
                            continue;
                        }
                    }
                },
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star_p, star_t)) => {
                backtrack = Some((star_p, star_t + 1));
                p = star_p + 1;
                t = star_t + 1;
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Match `ch` against the class opening at `pattern[open]`.
/// Returns `(matched, index after ']')`, or None when the class is unterminated.
fn match_class(pattern: &[u8], open: usize, ch: u8) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let c = pattern[i];
        if c == b']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;

        if c == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == ch;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = if c <= pattern[i + 2] { (c, pattern[i + 2]) } else { (pattern[i + 2], c) };
            matched |= lo <= ch && ch <= hi;
            i += 3;
        } else {
            matched |= c == ch;
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"chatbot:*", b"chatbot:user:1"));
        assert!(glob_match(b"chatbot:context:*", b"chatbot:context:U1:C1"));
        assert!(!glob_match(b"chatbot:context:*", b"chatbot:activeConvs:U1"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"a\\*b", b"a*b"));
        assert!(!glob_match(b"a\\*b", b"axb"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"*a*b", b"xxaxxb"));
    }

    #[test]
    fn test_list_range() {
        assert_eq!(list_range(5, 0, -1), Some((0, 4)));
        assert_eq!(list_range(5, 1, 2), Some((1, 2)));
        assert_eq!(list_range(5, -2, -1), Some((3, 4)));
        assert_eq!(list_range(5, 0, 100), Some((0, 4)));
        assert_eq!(list_range(5, 3, 1), None);
        assert_eq!(list_range(0, 0, -1), None);
        assert_eq!(list_range(5, -100, 0), Some((0, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let backend = MemoryBackend::new();
        backend.set("k", "v".to_string(), Some(10)).await.unwrap();
        assert_eq!(backend.ttl("k").await.unwrap(), 10);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(backend.ttl("k").await.unwrap(), 6);

        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.ttl("k").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_list_commands() {
        let backend = MemoryBackend::new();
        backend.rpush("l", vec!["a".into(), "b".into()]).await.unwrap();
        backend.lpush("l", "b".to_string()).await.unwrap();
        assert_eq!(backend.lrange("l", 0, -1).await.unwrap(), vec!["b", "a", "b"]);

        assert_eq!(backend.lrem("l", 0, "b").await.unwrap(), 2);
        assert_eq!(backend.lrange("l", 0, -1).await.unwrap(), vec!["a"]);

        backend.ltrim("l", 1, 0).await.unwrap();
        assert!(!backend.exists("l").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let backend = MemoryBackend::new();
        backend.set("s", "v".to_string(), None).await.unwrap();
        let err = backend.lpush("s", "x".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_rejected() {
        let backend = MemoryBackend::new();

        let err = backend.set("k", "v".to_string(), Some(u64::MAX)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(!backend.exists("k").await.unwrap());

        backend.set("k", "v".to_string(), None).await.unwrap();
        let err = backend.expire("k", i64::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(backend.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_hset_existing_never_creates() {
        let backend = MemoryBackend::new();
        let fields = vec![("metadata".to_string(), b"{}".to_vec())];

        assert!(!backend.hset_existing("h", fields.clone()).await.unwrap());
        assert!(!backend.exists("h").await.unwrap());

        backend.hset("h", vec![("vector".to_string(), vec![0; 4])]).await.unwrap();
        assert!(backend.hset_existing("h", fields).await.unwrap());

        let stored = backend.hgetall("h").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.get("metadata").unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_expire_and_persist() {
        let backend = MemoryBackend::new();
        assert!(!backend.expire("missing", 10).await.unwrap());

        backend.set("k", "v".to_string(), None).await.unwrap();
        assert_eq!(backend.ttl("k").await.unwrap(), -1);
        assert!(backend.expire("k", 30).await.unwrap());
        assert!(backend.persist("k").await.unwrap());
        assert_eq!(backend.ttl("k").await.unwrap(), -1);

        assert!(backend.expire("k", 0).await.unwrap());
        assert!(!backend.exists("k").await.unwrap());
    }
}
