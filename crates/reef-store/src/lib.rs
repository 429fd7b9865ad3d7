//! Key-value store and named-lock capabilities behind the cache facade.
//!
//! This crate defines the [`CacheStore`] and [`LockService`] traits along
//! with their backends:
//!
//! - [`MemoryStore`] and [`MemoryLock`]: in-process, for tests and local runs.
//! - [`SlowStore`]: wraps any store and injects seeded random latency.
//! - `RedisStore` and `RedisLock`: real instances, behind the `redis` feature.

mod error;
mod lock_guard;
mod memory_lock;
mod memory_store;
#[cfg(feature = "redis")]
mod redis_lock;
#[cfg(feature = "redis")]
mod redis_store;
mod slow_store;
mod traits;

pub use error::{LockError, StoreError};
pub use lock_guard::LockGuard;
pub use memory_lock::MemoryLock;
pub use memory_store::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_lock::RedisLock;
#[cfg(feature = "redis")]
pub use redis_store::{RedisEndpoint, RedisStore};
pub use slow_store::SlowStore;
pub use traits::{CacheStore, FieldMap, ListEnd, LockLease, LockService};
