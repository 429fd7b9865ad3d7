//! Integration test: populate-once writes across processes.
//!
//! Several facades (one per simulated process) share the instances and the
//! lock service, and race to fill the same lists on first access.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reef_cache::{CacheFacade, CacheFacadeConfig, lock_name};
use reef_integration_tests::{IntegrationCluster, keys, strings};
use reef_marshal::hash_record;
use reef_store::{LockService, MemoryLock};

const TTL: Duration = Duration::from_secs(300);

fn values_of(process: usize, task: usize) -> Vec<String> {
    vec![
        format!("p{process}t{task}-first"),
        format!("p{process}t{task}-second"),
    ]
}

/// 4 processes × 8 tasks race on 10 keys; each key gets exactly one writer.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20000)]
async fn test_one_winner_per_key_across_processes() {
    let c = IntegrationCluster::with_latency(3, 3);
    let processes: Vec<CacheFacade> = (0..4).map(|_| c.facade()).collect();
    let list_keys = keys("feed", 10);

    let mut handles = Vec::new();
    for (p, facade) in processes.iter().enumerate() {
        for t in 0..8 {
            let facade = facade.clone();
            let list_keys = list_keys.clone();
            handles.push(tokio::spawn(async move {
                let mut won = Vec::new();
                for key in &list_keys {
                    let written = facade
                        .write_right_list(key, &values_of(p, t))
                        .await
                        .unwrap();
                    if written > 0 {
                        won.push((key.clone(), p, t, written));
                    }
                }
                won
            }));
        }
    }

    let mut winners = Vec::new();
    for h in handles {
        winners.extend(h.await.unwrap());
    }

    assert_eq!(winners.len(), list_keys.len(), "winners: {winners:?}");
    let reader = c.facade();
    for key in &list_keys {
        let mine: Vec<_> = winners.iter().filter(|w| &w.0 == key).collect();
        assert_eq!(mine.len(), 1, "{key} winners: {mine:?}");
        let (_, p, t, written) = mine[0];
        assert_eq!(*written, 2);
        assert_eq!(reader.load_list_all(key).await.unwrap(), values_of(*p, *t));
        assert_eq!(c.holders_of(key).await.len(), 1);
    }
}

/// Head pushes from a winning process land reversed, as on the store.
#[tokio::test]
async fn test_left_populate_reverses_values() {
    let c = IntegrationCluster::new(2);
    let facade = c.facade();
    let written = facade
        .write_list("recent:9", &strings(&["1", "2", "3"]))
        .await
        .unwrap();
    assert_eq!(written, 3);

    // A second process sees the populated list and does nothing.
    let other = c.facade();
    assert_eq!(
        other
            .write_list("recent:9", &strings(&["x"]))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        other.load_list_all("recent:9").await.unwrap(),
        strings(&["3", "2", "1"])
    );
}

/// A process that crashed while holding a key's lock blocks writers only
/// until its hold time runs out.
#[tokio::test(start_paused = true)]
async fn test_crashed_holder_expires() {
    let locks = Arc::new(MemoryLock::new());
    let config = CacheFacadeConfig {
        lock_wait: Duration::from_secs(3),
        lock_hold: Duration::from_secs(10),
    };
    let c = IntegrationCluster::with_locks(2, locks.clone(), config);

    // The crashed process never releases.
    let _orphan = locks
        .try_acquire(&lock_name("feed:1"), Duration::ZERO, Duration::from_secs(5))
        .await
        .unwrap()
        .unwrap();

    let facade = c.facade();
    // Waits 3 s of the remaining 5 s hold, gives up.
    assert_eq!(
        facade
            .write_list("feed:1", &strings(&["a"]))
            .await
            .unwrap(),
        0
    );
    assert!(c.holders_of("feed:1").await.is_empty());

    // The next attempt outlasts the hold and writes.
    assert_eq!(
        facade
            .write_list("feed:1", &strings(&["a"]))
            .await
            .unwrap(),
        1
    );
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Profile {
    handle: String,
    followers: i64,
    joined_at: DateTime<Utc>,
    badges: Vec<String>,
}

hash_record!(Profile {
    handle,
    followers,
    joined_at,
    badges,
});

/// Read-through pattern: miss upstream → sentinel; hit upstream → record.
#[tokio::test]
async fn test_sentinels_shared_between_processes() {
    let c = IntegrationCluster::new(3);
    let writer = c.facade();
    let reader = c.facade();

    writer.write_empty("profile:handle:ghost", TTL).await.unwrap();
    writer.write_hash_empty("profile:404", TTL).await.unwrap();
    let profile = Profile {
        handle: "tidewatch".to_string(),
        followers: 1_204,
        joined_at: DateTime::from_timestamp_millis(1_650_000_000_000).unwrap(),
        badges: strings(&["early", "verified"]),
    };
    writer.write_hash("profile:7", &profile, TTL).await.unwrap();

    assert_eq!(
        reader
            .get_value("profile:handle:ghost")
            .await
            .unwrap()
            .as_deref(),
        Some("")
    );
    assert!(reader.is_empty_sentinel("profile:404").await.unwrap());
    assert!(!reader.is_empty_sentinel("profile:7").await.unwrap());
    assert_eq!(
        reader.load_hash::<Profile>("profile:404").await.unwrap(),
        None
    );
    assert_eq!(
        reader.load_hash::<Profile>("profile:7").await.unwrap(),
        Some(profile)
    );
}
