//! A [`CacheStore`] wrapper that adds configurable random round-trip latency.
//!
//! `SlowStore` wraps any `Arc<dyn CacheStore>` and sleeps for a random
//! duration before each read or write. The RNG is seeded for deterministic,
//! reproducible behaviour across test runs.
//!
//! # Example
//!
//! ```ignore
//! let slow = SlowStore::new(inner)
//!     .read_latency(1, 5)     // 1–5 ms per read
//!     .write_latency(5, 20)   // 5–20 ms per write
//!     .seed(42);
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::StoreError;
use crate::traits::{CacheStore, FieldMap, ListEnd};

/// A [`CacheStore`] wrapper that injects random latency before each call.
///
/// Widens the window between a check and the write that follows it, which
/// is where populate-once races live.
pub struct SlowStore {
    inner: Arc<dyn CacheStore>,
    read_latency_ms: (u64, u64),
    write_latency_ms: (u64, u64),
    rng: Mutex<StdRng>,
}

impl SlowStore {
    /// Wrap an existing store with zero latency (pass-through) by default.
    pub fn new(inner: Arc<dyn CacheStore>) -> Self {
        Self {
            inner,
            read_latency_ms: (0, 0),
            write_latency_ms: (0, 0),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Set the read latency range in milliseconds (uniform random).
    pub fn read_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.read_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the write latency range in milliseconds (uniform random).
    pub fn write_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.write_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the RNG seed for deterministic behaviour.
    pub fn seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Sleep for a random duration in `[min, max]` milliseconds.
    async fn delay(&self, range: (u64, u64)) {
        let (min, max) = range;

        if max == 0 {
            return;
        }

        let ms = if min >= max {
            max
        } else {
            self.rng
                .lock()
                .expect("lock poisoned")
                .random_range(min..=max)
        };

        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.set(key, value, ttl).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.incr_by(key, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.exists(key).await
    }

    async fn hash_put_all(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.hash_put_all(key, fields).await
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.hash_put(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.hash_get_all(key).await
    }

    async fn list_push_all(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, StoreError> {
        self.delay(self.write_latency_ms).await;
        self.inner.list_push_all(key, values, end).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.list_range(key, start, stop).await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.list_len(key).await
    }
}
