//! Lock service on a single Redis instance.
//!
//! A lock is the key `name` holding the lease token, set with `NX` and a
//! millisecond expiry. Release deletes the key only if it still holds the
//! caller's token.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{RedisError, Script};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::LockError;
use crate::redis_store::{RedisEndpoint, bounded, connect};
use crate::traits::{LockLease, LockService};

/// Pause between acquisition attempts while the lock is held elsewhere.
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// A [`LockService`] shared by every process pointed at the same instance.
#[derive(Clone)]
pub struct RedisLock {
    endpoint: RedisEndpoint,
    conn: ConnectionManager,
    timeout: Duration,
    release: Script,
}

impl RedisLock {
    /// Connect to the lock instance. `timeout` bounds the connect and each
    /// command, not the overall wait for a lock.
    pub async fn connect(endpoint: RedisEndpoint, timeout: Duration) -> Result<Self, LockError> {
        let conn = connect(&endpoint, timeout).await?;
        info!(%endpoint, "connected to lock service");
        Ok(Self {
            endpoint,
            conn,
            timeout,
            release: Script::new(RELEASE_SCRIPT),
        })
    }

    /// The instance holding the locks.
    pub fn endpoint(&self) -> &RedisEndpoint {
        &self.endpoint
    }

    async fn try_set(&self, lease: &LockLease, hold: Duration) -> Result<bool, RedisError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(lease.name())
            .arg(lease.token().to_string())
            .arg("NX")
            .arg("PX")
            .arg(hold.as_millis().max(1) as u64);
        let mut conn = self.conn.clone();
        let reply: Option<String> =
            bounded(self.timeout, async move { cmd.query_async(&mut conn).await }).await?;
        Ok(reply.is_some())
    }
}

#[async_trait::async_trait]
impl LockService for RedisLock {
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        let deadline = Instant::now() + wait;
        let lease = LockLease::new(name);
        loop {
            if self.try_set(&lease, hold).await? {
                debug!(%lease, "lock granted");
                return Ok(Some(lease));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(name, ?wait, "lock wait timed out");
                return Ok(None);
            }
            tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        let mut invocation = self.release.key(lease.name());
        invocation.arg(lease.token().to_string());
        let mut conn = self.conn.clone();
        let removed: i64 = bounded(self.timeout, async move {
            invocation.invoke_async(&mut conn).await
        })
        .await?;
        debug!(%lease, released = removed == 1, "lock release");
        Ok(removed == 1)
    }
}
