//! Core traits and types for cache stores and locks.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{LockError, StoreError};

/// Field name → value contents of a hash slot.
pub type FieldMap = BTreeMap<String, String>;

/// Which end of a list a push goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    /// Head of the list. Pushing `[a, b, c]` yields `[c, b, a]`.
    Left,
    /// Tail of the list. Pushing `[a, b, c]` yields `[a, b, c]`.
    Right,
}

/// Operations of one key-value store instance.
///
/// Each key holds a scalar, a hash, or a list. Every mutating call is a
/// single atomic operation on the instance, so readers never observe a
/// partially written hash or list.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a scalar. Returns `None` if the key is unset.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the key with a scalar, with an optional time-to-live.
    ///
    /// Without a TTL the key never expires, even if it had a TTL before.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Add `delta` to an integer scalar (unset counts as 0) and return the result.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Set the key's time-to-live. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove the key. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Check whether the key exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Write all `fields` into the hash at `key`, keeping other fields.
    async fn hash_put_all(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError>;

    /// Write one field into the hash at `key`.
    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Read every field of the hash at `key`. Empty if the key is unset.
    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError>;

    /// Push `values` onto one end of the list at `key`, one at a time in
    /// order, and return the new length.
    async fn list_push_all(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, StoreError>;

    /// Read the inclusive range `start..=stop` of the list at `key`.
    ///
    /// Negative indices count from the tail (`-1` is the last element).
    async fn list_range(&self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>, StoreError>;

    /// Length of the list at `key`, 0 if unset.
    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;
}

/// Proof of holding a named lock.
///
/// Only the holder of the lease's token can release it, so a caller whose
/// lease expired cannot release a lock granted to someone else since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    name: String,
    token: Uuid,
}

impl LockLease {
    /// Create a lease for `name` with a fresh random token.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: Uuid::new_v4(),
        }
    }

    /// The lock name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The holder's token.
    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl fmt::Display for LockLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.token.simple())
    }
}

/// A named mutual-exclusion primitive shared between processes.
#[async_trait::async_trait]
pub trait LockService: Send + Sync {
    /// Try to acquire `name`, waiting up to `wait`.
    ///
    /// A granted lock expires by itself after `hold` unless released first.
    /// Returns `Ok(None)` when the wait runs out.
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>, LockError>;

    /// Release a lease.
    ///
    /// Returns `false` if the lease was no longer held (it expired, possibly
    /// with the lock since granted to another caller).
    async fn release(&self, lease: &LockLease) -> Result<bool, LockError>;
}
