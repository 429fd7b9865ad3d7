//! Cache facade over a sharded set of key-value store instances.
//!
//! The [`CacheFacade`] routes each key through a consistent hash ring to the
//! one instance that owns it, marshals records to and from hash slots, and
//! guards first-time list population with a per-key lock so concurrent
//! writers populate a list at most once.

pub mod error;
pub mod facade;

pub use error::CacheError;
pub use facade::{
    CacheFacade, CacheFacadeConfig, EMPTY_FIELD, EMPTY_VALUE, LOCK_PREFIX, StoreRing,
    is_sentinel_fields, lock_name,
};
pub use reef_store::ListEnd;

#[cfg(test)]
mod tests;
