//! [`CacheFacade`]: typed cache operations over a sharded set of stores.
//!
//! Every operation resolves its key through the ring and runs against the
//! owning instance only. There is no retry and no failover: an unreachable
//! instance fails the keys it owns and nothing else.
//!
//! Two sentinels mark "looked up upstream and confirmed absent", so callers
//! can cache misses without re-querying the source:
//!
//! - scalar slots hold [`EMPTY_VALUE`] (`""`),
//! - hash slots hold the single field pair [`EMPTY_FIELD`] → [`EMPTY_FIELD`].
//!
//! List slots are populated at most once per key through
//! [`write_list_once`](CacheFacade::write_list_once), which takes the
//! key's lock only when the cheap length check says the list is unset.

use std::sync::Arc;
use std::time::Duration;

use reef_marshal::{HashRecord, from_field_map, try_to_field_map};
use reef_placement::Ring;
use reef_store::{CacheStore, FieldMap, ListEnd, LockGuard, LockService};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Scalar sentinel: a cached "no value".
pub const EMPTY_VALUE: &str = "";

/// Hash sentinel: a cached "no record", stored as this field name and value.
pub const EMPTY_FIELD: &str = "null";

/// Prefix of the per-key populate lock.
pub const LOCK_PREFIX: &str = "lock.";

/// Name of the lock guarding the populate-once write of `key`.
pub fn lock_name(key: &str) -> String {
    format!("{LOCK_PREFIX}{key}")
}

/// Whether a hash slot's contents are the empty-record sentinel.
pub fn is_sentinel_fields(fields: &FieldMap) -> bool {
    fields
        .get(EMPTY_FIELD)
        .is_some_and(|value| value == EMPTY_FIELD)
}

/// Lock timing for populate-once writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFacadeConfig {
    /// How long a writer waits for the key's lock before giving up.
    pub lock_wait: Duration,
    /// How long a granted lock lives if its holder never releases it.
    pub lock_hold: Duration,
}

impl Default for CacheFacadeConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(3),
            lock_hold: Duration::from_secs(10),
        }
    }
}

/// The ring type the facade routes over.
pub type StoreRing = Ring<Arc<dyn CacheStore>>;

/// Cache operations routed to the instance owning each key.
///
/// Cheap to clone; clones share the ring and the lock service.
#[derive(Clone)]
pub struct CacheFacade {
    ring: Arc<StoreRing>,
    locks: Arc<dyn LockService>,
    config: CacheFacadeConfig,
}

impl CacheFacade {
    /// Create a facade over an already-built ring.
    pub fn new(
        ring: Arc<StoreRing>,
        locks: Arc<dyn LockService>,
        config: CacheFacadeConfig,
    ) -> Self {
        Self {
            ring,
            locks,
            config,
        }
    }

    /// Build the ring over `stores` (in ring order) and wrap it.
    pub fn from_stores(
        stores: Vec<Arc<dyn CacheStore>>,
        vnodes_per_instance: u16,
        locks: Arc<dyn LockService>,
        config: CacheFacadeConfig,
    ) -> Result<Self, CacheError> {
        let ring = Ring::new(stores, vnodes_per_instance)?;
        Ok(Self::new(Arc::new(ring), locks, config))
    }

    /// The routing ring.
    pub fn ring(&self) -> &Arc<StoreRing> {
        &self.ring
    }

    /// Lock timing in use.
    pub fn config(&self) -> CacheFacadeConfig {
        self.config
    }

    /// The store instance owning `key`.
    pub fn store_for(&self, key: &str) -> &Arc<dyn CacheStore> {
        self.ring.resolve(key)
    }

    // ---- scalars ----

    /// Overwrite the scalar at `key`, optionally expiring after `ttl`.
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub async fn write_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.store_for(key).set(key, value, ttl).await?;
        Ok(())
    }

    /// Cache a miss: store the scalar sentinel with a TTL.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn write_empty(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.store_for(key).set(key, EMPTY_VALUE, Some(ttl)).await?;
        Ok(())
    }

    /// Read the scalar at `key`. A cached miss reads as `Some("")`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.store_for(key).get(key).await?)
    }

    /// Atomically add `delta` to the integer at `key` and return the result.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn increment_and_get(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        Ok(self.store_for(key).incr_by(key, delta).await?)
    }

    /// Set or refresh the TTL of `key`. Returns `false` if the key is unset.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        Ok(self.store_for(key).expire(key, ttl).await?)
    }

    // ---- hashes ----

    /// Store `record` as a hash at `key` and set its TTL.
    ///
    /// If the record cannot be marshalled the failure is logged and no
    /// fields are written; the TTL is still applied to whatever the slot
    /// already holds. Fields are merged into an existing hash.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub async fn write_hash<T: HashRecord>(
        &self,
        key: &str,
        record: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let fields = match try_to_field_map(record) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(key, %e, "failed to marshal record, writing no fields");
                FieldMap::new()
            }
        };
        let store = self.store_for(key);
        store.hash_put_all(key, &fields).await?;
        store.expire(key, ttl).await?;
        debug!(key, fields = fields.len(), "wrote hash");
        Ok(())
    }

    /// Cache a missing record: store the hash sentinel with a TTL.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn write_hash_empty(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let store = self.store_for(key);
        store.hash_put(key, EMPTY_FIELD, EMPTY_FIELD).await?;
        store.expire(key, ttl).await?;
        Ok(())
    }

    /// Load the record stored at `key`.
    ///
    /// Returns `None` both when the slot is unset and when it holds the
    /// sentinel; use [`is_empty_sentinel`](Self::is_empty_sentinel) to tell
    /// them apart.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load_hash<T: HashRecord>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let fields = self.store_for(key).hash_get_all(key).await?;
        if fields.is_empty() || is_sentinel_fields(&fields) {
            return Ok(None);
        }
        Ok(Some(from_field_map(&fields)))
    }

    /// Whether the hash at `key` holds the empty-record sentinel.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn is_empty_sentinel(&self, key: &str) -> Result<bool, CacheError> {
        let fields = self.store_for(key).hash_get_all(key).await?;
        Ok(is_sentinel_fields(&fields))
    }

    // ---- lists ----

    /// Populate-once head push. See [`write_list_once`](Self::write_list_once).
    pub async fn write_list(&self, key: &str, values: &[String]) -> Result<u64, CacheError> {
        self.write_list_once(key, values, ListEnd::Left).await
    }

    /// Populate-once tail push. See [`write_list_once`](Self::write_list_once).
    pub async fn write_right_list(&self, key: &str, values: &[String]) -> Result<u64, CacheError> {
        self.write_list_once(key, values, ListEnd::Right).await
    }

    /// Push `values` onto the list at `key` only if the list is unset.
    ///
    /// Double-checked: a populated list returns 0 without touching the lock;
    /// otherwise the key's lock is taken and the length checked again before
    /// pushing. Returns the new length when this call wrote the list and 0
    /// when it did not (empty `values`, already populated, or the lock could
    /// not be taken). Lock failures are logged, never returned. Store
    /// failures are returned after the lock is released.
    #[tracing::instrument(level = "debug", skip(self, values), fields(count = values.len()))]
    pub async fn write_list_once(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, CacheError> {
        if values.is_empty() {
            return Ok(0);
        }

        let store = self.store_for(key);
        if store.list_len(key).await? >= 1 {
            debug!(key, "list already populated");
            return Ok(0);
        }

        let name = lock_name(key);
        let lease = match self
            .locks
            .try_acquire(&name, self.config.lock_wait, self.config.lock_hold)
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                warn!(key, wait = ?self.config.lock_wait, "timed out waiting for populate lock");
                return Ok(0);
            }
            Err(e) => {
                warn!(key, %e, "failed to acquire populate lock");
                return Ok(0);
            }
        };
        let guard = LockGuard::new(Arc::clone(&self.locks), lease);

        let outcome = Self::populate_locked(store.as_ref(), key, values, end).await;

        match guard.release().await {
            Ok(true) => {}
            Ok(false) => warn!(key, "populate lock expired before release"),
            Err(e) => warn!(key, %e, "failed to release populate lock"),
        }
        outcome
    }

    /// Second half of the double check, run while holding the key's lock.
    async fn populate_locked(
        store: &dyn CacheStore,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, CacheError> {
        if store.list_len(key).await? >= 1 {
            debug!(key, "list populated while waiting for lock");
            return Ok(0);
        }
        let len = store.list_push_all(key, values, end).await?;
        debug!(key, len, ?end, "populated list");
        Ok(len)
    }

    /// Cache an empty list: head-push placeholder `values` and set the TTL.
    ///
    /// Unguarded; returns the resulting length.
    #[tracing::instrument(level = "debug", skip(self, values))]
    pub async fn write_list_empty(
        &self,
        key: &str,
        ttl: Duration,
        values: &[String],
    ) -> Result<u64, CacheError> {
        let store = self.store_for(key);
        let len = store.list_push_all(key, values, ListEnd::Left).await?;
        store.expire(key, ttl).await?;
        Ok(len)
    }

    /// Read the inclusive range `start..=end` of the list at `key`.
    ///
    /// Negative indices count from the tail.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load_list(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<String>, CacheError> {
        Ok(self.store_for(key).list_range(key, start, end).await?)
    }

    /// Read the whole list at `key`.
    pub async fn load_list_all(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.load_list(key, 0, -1).await
    }

    /// Length of the list at `key`, 0 if unset.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_len(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self.store_for(key).list_len(key).await?)
    }

    // ---- keys ----

    /// Remove `key`. Returns `true` if it existed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete_key(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store_for(key).delete(key).await?)
    }

    /// Remove every key in `keys`, each on its own instance.
    ///
    /// Returns how many existed. Stops at the first failing instance.
    #[tracing::instrument(level = "debug", skip(self, keys), fields(count = keys.len()))]
    pub async fn delete_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<u64, CacheError> {
        let mut removed = 0;
        for key in keys {
            let key = key.as_ref();
            if self.store_for(key).delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Whether `key` exists.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn has_key(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store_for(key).exists(key).await?)
    }
}
