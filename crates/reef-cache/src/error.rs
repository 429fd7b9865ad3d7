//! Error types for the cache facade.

/// Errors that can occur during facade operations.
///
/// Marshalling and lock failures never surface here: they are logged and
/// the operation carries on as documented per operation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The owning store instance failed.
    #[error("store error: {0}")]
    Store(#[from] reef_store::StoreError),

    /// The ring could not be built.
    #[error("routing error: {0}")]
    Routing(#[from] reef_placement::RoutingError),
}
