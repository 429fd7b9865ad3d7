//! In-memory cache store backend.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{CacheStore, FieldMap, ListEnd};

/// A stored value and its shape.
#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Hash(FieldMap),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory cache store backed by a `RwLock<HashMap>`.
///
/// Mirrors the semantics of a Redis instance for the operations of
/// [`CacheStore`]: typed slots, TTLs, head/tail list pushes and negative
/// range indices. Expired keys are dropped lazily on the next write that
/// touches them and are invisible to reads.
///
/// TTLs run on [`tokio::time::Instant`], so tests can drive expiry with a
/// paused clock.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let map = self.entries.read().expect("lock poisoned");
        map.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live<'a>(map: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Value> {
        map.get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| &e.value)
    }

    fn live_mut<'a>(map: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
            debug!(key, "dropped expired key");
        }
        map.get_mut(key)
    }

    fn wrong_type(key: &str, expected: &'static str) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
            expected,
        }
    }
}

/// Clamp a Redis-style inclusive range to `0..len`.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start >= len || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        match Self::live(&map, key) {
            Some(Value::Scalar(value)) => Ok(Some(value.clone())),
            Some(_) => Err(Self::wrong_type(key, "string")),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(StoreError::Backend("invalid expire time in set".to_string()));
        }
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(
            key.to_string(),
            Entry::new(Value::Scalar(value.to_string()), ttl),
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        match Self::live_mut(&mut map, key) {
            Some(Entry {
                value: Value::Scalar(current),
                ..
            }) => {
                let next = current
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| n.checked_add(delta))
                    .ok_or_else(|| StoreError::NotAnInteger(key.to_string()))?;
                *current = next.to_string();
                Ok(next)
            }
            Some(_) => Err(Self::wrong_type(key, "string")),
            None => {
                map.insert(
                    key.to_string(),
                    Entry::new(Value::Scalar(delta.to_string()), None),
                );
                Ok(delta)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        let Some(entry) = Self::live_mut(&mut map, key) else {
            return Ok(false);
        };
        if ttl.is_zero() {
            map.remove(key);
        } else {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        let existed = Self::live_mut(&mut map, key).is_some();
        map.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(Self::live(&map, key).is_some())
    }

    async fn hash_put_all(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut map = self.entries.write().expect("lock poisoned");
        match Self::live_mut(&mut map, key) {
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => {
                hash.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            Some(_) => Err(Self::wrong_type(key, "hash")),
            None => {
                map.insert(key.to_string(), Entry::new(Value::Hash(fields.clone()), None));
                Ok(())
            }
        }
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut fields = FieldMap::new();
        fields.insert(field.to_string(), value.to_string());
        self.hash_put_all(key, &fields).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        match Self::live(&map, key) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(Self::wrong_type(key, "hash")),
            None => Ok(FieldMap::new()),
        }
    }

    async fn list_push_all(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, StoreError> {
        let mut map = self.entries.write().expect("lock poisoned");
        if values.is_empty() {
            return match Self::live_mut(&mut map, key) {
                Some(Entry {
                    value: Value::List(list),
                    ..
                }) => Ok(list.len() as u64),
                Some(_) => Err(Self::wrong_type(key, "list")),
                None => Ok(0),
            };
        }

        let entry = match Self::live_mut(&mut map, key) {
            Some(entry) => entry,
            None => map
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Value::List(VecDeque::new()), None)),
        };
        let Value::List(list) = &mut entry.value else {
            return Err(Self::wrong_type(key, "list"));
        };

        for value in values {
            match end {
                ListEnd::Left => list.push_front(value.clone()),
                ListEnd::Right => list.push_back(value.clone()),
            }
        }
        debug!(key, pushed = values.len(), len = list.len(), ?end, "pushed list values");
        Ok(list.len() as u64)
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        match Self::live(&map, key) {
            Some(Value::List(list)) => Ok(range_bounds(list.len(), start, stop)
                .map(|(from, to)| list.range(from..=to).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(Self::wrong_type(key, "list")),
            None => Ok(Vec::new()),
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let map = self.entries.read().expect("lock poisoned");
        match Self::live(&map, key) {
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(Self::wrong_type(key, "list")),
            None => Ok(0),
        }
    }
}
