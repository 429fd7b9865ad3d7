//! Integration test: instance failure.
//!
//! There is no failover: an unreachable instance fails exactly the keys it
//! owns, and every other key keeps working.

use std::sync::Arc;

use reef_cache::{CacheError, CacheFacadeConfig};
use reef_integration_tests::{IntegrationCluster, keys, strings};
use reef_store::{LockError, LockLease, LockService, MemoryLock, StoreError};

/// 3 instances, kill instance 1: its keys fail, the rest succeed.
#[tokio::test]
async fn test_failure_confined_to_owned_keys() {
    let c = IntegrationCluster::new(3);
    let facade = c.facade();
    let all = keys("session", 90);
    for key in &all {
        facade.write_string(key, "live", None).await.unwrap();
    }

    c.kill_instance(1).await;

    let mut failed = 0;
    for key in &all {
        let result = facade.get_value(key).await;
        if facade.ring().resolve_index(key) == 1 {
            assert!(
                matches!(result, Err(CacheError::Store(StoreError::Unavailable(_)))),
                "{key} should fail"
            );
            failed += 1;
        } else {
            assert_eq!(result.unwrap().as_deref(), Some("live"), "{key}");
        }
    }
    assert!(failed > 0, "instance 1 owned no keys");
    assert_eq!(failed, c.store(1).len());
}

/// A revived instance serves its keys again, data intact.
#[tokio::test]
async fn test_revived_instance_serves_again() {
    let c = IntegrationCluster::new(2);
    let facade = c.facade();
    let all = keys("doc", 40);
    for key in &all {
        facade.write_right_list(key, &strings(&["v1"])).await.unwrap();
    }

    c.kill_instance(0).await;
    c.revive_instance(0).await;

    for key in &all {
        assert_eq!(facade.load_list_all(key).await.unwrap(), strings(&["v1"]));
    }
}

/// A lock service that counts attempts.
#[derive(Default)]
struct ObservedLock {
    inner: MemoryLock,
    attempts: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl LockService for ObservedLock {
    async fn try_acquire(
        &self,
        name: &str,
        wait: std::time::Duration,
        hold: std::time::Duration,
    ) -> Result<Option<LockLease>, LockError> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.try_acquire(name, wait, hold).await
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        self.inner.release(lease).await
    }
}

/// Populate-once on a dead instance fails at the unlocked check, before any
/// lock is requested.
#[tokio::test]
async fn test_populate_on_dead_instance_fails_before_locking() {
    let locks = Arc::new(ObservedLock::default());
    let c = IntegrationCluster::with_locks(2, locks.clone(), CacheFacadeConfig::default());
    let facade = c.facade();

    let key = keys("feed", 50)
        .into_iter()
        .find(|k| facade.ring().resolve_index(k) == 0)
        .expect("some key routes to instance 0");

    c.kill_instance(0).await;
    let err = facade
        .write_list(&key, &strings(&["a"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Store(StoreError::Unavailable(_))));
    assert_eq!(
        locks.attempts.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

/// Bulk delete stops at the first key owned by a dead instance.
#[tokio::test]
async fn test_delete_keys_surfaces_dead_instance() {
    let c = IntegrationCluster::new(2);
    let facade = c.facade();
    let all = keys("tmp", 30);
    for key in &all {
        facade.write_string(key, "x", None).await.unwrap();
    }

    c.kill_instance(1).await;
    assert!(facade.delete_keys(all.as_slice()).await.is_err());

    c.revive_instance(1).await;
    let already_removed = all.len() - (c.store(0).len() + c.store(1).len());
    let removed = facade.delete_keys(all.as_slice()).await.unwrap();
    assert_eq!(removed as usize + already_removed, all.len());
    assert!(c.store(0).is_empty());
    assert!(c.store(1).is_empty());
}
