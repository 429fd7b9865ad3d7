//! Consistent hashing ring implementation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::RoutingError;

/// Default number of vnodes per instance.
pub const DEFAULT_VNODES: u16 = 160;

/// Consistent hashing ring over a fixed, ordered list of instances.
///
/// Each instance is mapped to multiple virtual nodes (vnodes) on a u64 ring.
/// A key is owned by the instance of the first vnode found walking clockwise
/// from the key's position, wrapping to the lowest position past the end.
///
/// The ring is immutable once built. Share it behind an `Arc` and resolve
/// from any number of tasks without synchronization.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    /// Virtual node positions: ring position -> instance ordinal.
    vnodes: BTreeMap<u64, usize>,
    /// Instances in configuration order.
    instances: Vec<T>,
    /// Vnodes requested per instance.
    vnodes_per_instance: u16,
}

impl<T> Ring<T> {
    /// Build a ring over `instances`, placing `vnodes_per_instance` vnodes
    /// for each.
    ///
    /// Vnode positions are derived from the instance's ordinal, so the order
    /// of `instances` matters: the same list in the same order always
    /// produces the same ring.
    ///
    /// Colliding positions are not deduplicated. A later vnode silently
    /// takes over an earlier one at the same position, which leaves
    /// [`vnode_count`](Self::vnode_count) below `instances * vnodes`.
    pub fn new(instances: Vec<T>, vnodes_per_instance: u16) -> Result<Self, RoutingError> {
        if instances.is_empty() {
            return Err(RoutingError::NoInstances);
        }
        if vnodes_per_instance == 0 {
            return Err(RoutingError::ZeroVirtualNodes);
        }

        let mut vnodes = BTreeMap::new();
        for ordinal in 0..instances.len() {
            for n in 0..vnodes_per_instance {
                vnodes.insert(position(vnode_label(ordinal, n).as_bytes()), ordinal);
            }
        }

        debug!(
            instances = instances.len(),
            vnodes_per_instance,
            vnodes = vnodes.len(),
            "built hash ring"
        );

        Ok(Self {
            vnodes,
            instances,
            vnodes_per_instance,
        })
    }

    /// Build a ring with [`DEFAULT_VNODES`] vnodes per instance.
    pub fn with_default_vnodes(instances: Vec<T>) -> Result<Self, RoutingError> {
        Self::new(instances, DEFAULT_VNODES)
    }

    /// Return the instance that owns `key`.
    pub fn resolve(&self, key: &str) -> &T {
        &self.instances[self.resolve_index(key)]
    }

    /// Return the ordinal of the instance that owns `key`.
    pub fn resolve_index(&self, key: &str) -> usize {
        self.resolve_position(key_position(key))
    }

    /// Return the ordinal of the instance that owns ring position `pos`.
    ///
    /// Walks clockwise to the first vnode at or after `pos`. Positions past
    /// the last vnode wrap to the lowest vnode on the ring.
    pub fn resolve_position(&self, pos: u64) -> usize {
        let (_, ordinal) = self
            .vnodes
            .range(pos..)
            .next()
            .or_else(|| self.vnodes.first_key_value())
            .expect("ring always holds at least one vnode");
        *ordinal
    }

    /// Return the instance at `ordinal`, if any.
    pub fn instance(&self, ordinal: usize) -> Option<&T> {
        self.instances.get(ordinal)
    }

    /// Return all instances in configuration order.
    pub fn instances(&self) -> &[T] {
        &self.instances
    }

    /// Return the number of instances in the ring.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Return the number of distinct vnode positions on the ring.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    /// Return the configured vnodes per instance.
    pub fn vnodes_per_instance(&self) -> u16 {
        self.vnodes_per_instance
    }

    /// Lowest vnode position on the ring.
    pub fn first_position(&self) -> u64 {
        self.vnodes.keys().next().copied().unwrap_or_default()
    }

    /// Highest vnode position on the ring.
    pub fn last_position(&self) -> u64 {
        self.vnodes.keys().next_back().copied().unwrap_or_default()
    }

    /// Count how many of `keys` each instance owns, indexed by ordinal.
    pub fn distribution<'a, I>(&self, keys: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = vec![0usize; self.instances.len()];
        for key in keys {
            counts[self.resolve_index(key)] += 1;
        }
        counts
    }
}

/// Label hashed to place vnode `n` of the instance at `ordinal`.
pub fn vnode_label(ordinal: usize, n: u16) -> String {
    format!("SHARD-{ordinal}-NODE-{n}")
}

/// Ring position of a cache key.
pub fn key_position(key: &str) -> u64 {
    position(key.as_bytes())
}

/// blake3(data) truncated to its first 8 bytes, little-endian.
fn position(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[..8].try_into().expect("8 bytes");
    u64::from_le_bytes(bytes)
}
