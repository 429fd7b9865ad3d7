//! Shared test utilities for reef-cache tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reef_marshal::{hash_record, symbolic_enum};
use reef_store::{
    CacheStore, FieldMap, ListEnd, LockError, LockLease, LockService, MemoryLock, MemoryStore,
    StoreError,
};

use crate::facade::{CacheFacade, CacheFacadeConfig};

pub const TEST_VNODES: u16 = 64;

pub const TTL: Duration = Duration::from_secs(60);

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

symbolic_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum Genre {
        #[default]
        Fantasy,
        Mystery,
    }
}

/// A record with one field of each kind the facade stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub title: String,
    pub chapters: i64,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub genre: Genre,
}

hash_record!(Book {
    title,
    chapters,
    updated_at,
    tags,
    genre,
});

pub fn sample_book() -> Book {
    Book {
        title: "Salt Roads".to_string(),
        chapters: 42,
        updated_at: DateTime::from_timestamp_millis(1_710_000_000_000).unwrap(),
        tags: strings(&["travel", "serial"]),
        genre: Genre::Mystery,
    }
}

/// A facade over a single in-memory instance.
pub fn single_store_facade() -> (CacheFacade, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let facade = CacheFacade::from_stores(
        vec![store.clone() as Arc<dyn CacheStore>],
        TEST_VNODES,
        Arc::new(MemoryLock::new()),
        CacheFacadeConfig::default(),
    )
    .unwrap();
    (facade, store)
}

/// A facade over `n` in-memory instances sharing one lock service.
pub fn sharded_facade(
    n: usize,
    locks: Arc<dyn LockService>,
    config: CacheFacadeConfig,
) -> (CacheFacade, Vec<Arc<MemoryStore>>) {
    let stores: Vec<Arc<MemoryStore>> = (0..n).map(|_| Arc::new(MemoryStore::new())).collect();
    let facade = CacheFacade::from_stores(
        stores
            .iter()
            .map(|s| s.clone() as Arc<dyn CacheStore>)
            .collect(),
        TEST_VNODES,
        locks,
        config,
    )
    .unwrap();
    (facade, stores)
}

/// A facade over one arbitrary store with the given lock service.
pub fn facade_with(
    store: Arc<dyn CacheStore>,
    locks: Arc<dyn LockService>,
    config: CacheFacadeConfig,
) -> CacheFacade {
    CacheFacade::from_stores(vec![store], TEST_VNODES, locks, config).unwrap()
}

/// A [`MemoryLock`] that counts acquisition attempts and releases.
#[derive(Default)]
pub struct CountingLock {
    inner: MemoryLock,
    pub attempts: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryLock {
        &self.inner
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LockService for CountingLock {
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.try_acquire(name, wait, hold).await
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(lease).await
    }
}

/// A lock service whose backend is always broken.
pub struct FailingLock;

#[async_trait::async_trait]
impl LockService for FailingLock {
    async fn try_acquire(
        &self,
        _name: &str,
        _wait: Duration,
        _hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        Err(LockError::Backend("lock server unreachable".to_string()))
    }

    async fn release(&self, _lease: &LockLease) -> Result<bool, LockError> {
        Err(LockError::Backend("lock server unreachable".to_string()))
    }
}

/// A lock that lets a rival writer populate the list while the caller waits.
///
/// Models losing the race between the unlocked check and the locked one.
pub struct RivalLock {
    pub inner: CountingLock,
    store: Arc<MemoryStore>,
    key: String,
    values: Vec<String>,
}

impl RivalLock {
    pub fn new(store: Arc<MemoryStore>, key: &str, values: &[&str]) -> Self {
        Self {
            inner: CountingLock::new(),
            store,
            key: key.to_string(),
            values: strings(values),
        }
    }
}

#[async_trait::async_trait]
impl LockService for RivalLock {
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        self.store
            .list_push_all(&self.key, &self.values, ListEnd::Right)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        self.inner.try_acquire(name, wait, hold).await
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        self.inner.release(lease).await
    }
}

/// A [`MemoryStore`] whose list pushes can be made to fail.
#[derive(Default)]
pub struct FlakyPushStore {
    inner: MemoryStore,
    pub fail_pushes: AtomicBool,
}

impl FlakyPushStore {
    pub fn failing() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_pushes: AtomicBool::new(true),
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for FlakyPushStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.inner.incr_by(key, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn hash_put_all(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        self.inner.hash_put_all(key, fields).await
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.inner.hash_put(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        self.inner.hash_get_all(key).await
    }

    async fn list_push_all(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, StoreError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("push rejected".to_string()));
        }
        self.inner.list_push_all(key, values, end).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.list_range(key, start, stop).await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.inner.list_len(key).await
    }
}
