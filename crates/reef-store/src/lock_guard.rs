//! Scoped ownership of a lock lease.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LockError;
use crate::traits::{LockLease, LockService};

/// Owns a granted lease until it is released.
///
/// Call [`release`](Self::release) on every normal exit path. If the guard
/// is dropped while still holding the lease (for example because the task
/// awaiting the critical section was cancelled), the release is spawned on
/// the current Tokio runtime. Without a runtime the lease is left to expire
/// after its hold time.
pub struct LockGuard {
    locks: Arc<dyn LockService>,
    lease: Option<LockLease>,
}

impl LockGuard {
    /// Wrap a lease granted by `locks`.
    pub fn new(locks: Arc<dyn LockService>, lease: LockLease) -> Self {
        Self {
            locks,
            lease: Some(lease),
        }
    }

    /// The lock name this guard holds.
    pub fn name(&self) -> &str {
        self.lease.as_ref().map_or("", LockLease::name)
    }

    /// Release the lease now.
    ///
    /// Returns `false` if the lease had already expired.
    pub async fn release(mut self) -> Result<bool, LockError> {
        match self.lease.take() {
            Some(lease) => self.locks.release(&lease).await,
            None => Ok(false),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%lease, "releasing dropped lease in background");
                let locks = Arc::clone(&self.locks);
                handle.spawn(async move {
                    if let Err(e) = locks.release(&lease).await {
                        warn!(%lease, %e, "failed to release dropped lease");
                    }
                });
            }
            Err(_) => {
                warn!(%lease, "no runtime to release dropped lease, leaving it to expire");
            }
        }
    }
}
