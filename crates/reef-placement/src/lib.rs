//! Consistent hashing ring for deterministic key routing.
//!
//! This crate implements a hash ring that maps cache keys to one of a fixed,
//! ordered list of backend instances. Every key is owned by exactly one
//! instance, and the same instance list always produces the same ring, so
//! repeated startups route keys identically.
//!
//! The ring uses virtual nodes (vnodes): the instance at ordinal `i` gets
//! `vnodes_per_instance` positions on the ring, one per label
//! `SHARD-{i}-NODE-{n}`, each placed at `blake3(label)` truncated to `u64`.
//! Positions depend only on the ordinal, never on the instance itself.

mod error;
mod ring;

pub use error::RoutingError;
pub use ring::{DEFAULT_VNODES, Ring, key_position, vnode_label};
