//! Error types for ring construction.

/// Errors that can occur while building a [`Ring`](crate::Ring).
///
/// Lookups never fail: once a ring exists it always has at least one vnode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// The instance list was empty.
    #[error("cannot build a ring over zero instances")]
    NoInstances,

    /// The vnode count per instance was zero.
    #[error("vnodes per instance must be at least 1")]
    ZeroVirtualNodes,
}
