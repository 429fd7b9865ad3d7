//! In-process lock service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::LockError;
use crate::traits::{LockLease, LockService};

struct Holder {
    token: Uuid,
    expires_at: Instant,
}

/// Named locks shared by every task in the process.
///
/// Waiters wake on release or when the current holder's lease runs out,
/// whichever comes first, and give up at their own deadline.
#[derive(Default)]
pub struct MemoryLock {
    holders: Mutex<HashMap<String, Holder>>,
    released: Notify,
}

impl MemoryLock {
    /// Create a lock service with no locks held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently held by an unexpired lease.
    pub fn is_locked(&self, name: &str) -> bool {
        let holders = self.holders.lock().expect("lock poisoned");
        holders
            .get(name)
            .is_some_and(|h| h.expires_at > Instant::now())
    }

    /// Grant the lock if it is free, otherwise return when the holder expires.
    fn grant_or_expiry(&self, name: &str, hold: Duration) -> Result<LockLease, Instant> {
        let mut holders = self.holders.lock().expect("lock poisoned");
        let now = Instant::now();
        if let Some(holder) = holders.get(name) {
            if holder.expires_at > now {
                return Err(holder.expires_at);
            }
        }
        let lease = LockLease::new(name);
        holders.insert(
            name.to_string(),
            Holder {
                token: lease.token(),
                expires_at: now + hold,
            },
        );
        Ok(lease)
    }
}

#[async_trait::async_trait]
impl LockService for MemoryLock {
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            // Register for wakeups before checking, so a release between the
            // check and the wait is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let holder_expiry = match self.grant_or_expiry(name, hold) {
                Ok(lease) => {
                    debug!(%lease, "lock granted");
                    return Ok(Some(lease));
                }
                Err(expires_at) => expires_at,
            };

            if Instant::now() >= deadline {
                debug!(name, ?wait, "lock wait timed out");
                return Ok(None);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(holder_expiry.min(deadline)) => {}
            }
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        let mut holders = self.holders.lock().expect("lock poisoned");
        let Some(holder) = holders.get(lease.name()) else {
            return Ok(false);
        };
        if holder.token != lease.token() {
            debug!(%lease, "lock now held by another lease, not releasing");
            return Ok(false);
        }
        let live = holder.expires_at > Instant::now();
        holders.remove(lease.name());
        drop(holders);
        self.released.notify_waiters();
        debug!(%lease, live, "lock released");
        Ok(live)
    }
}
