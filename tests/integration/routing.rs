//! Integration test: key routing across independently built facades.

use reef_integration_tests::{IntegrationCluster, keys};
use reef_placement::{Ring, key_position};

/// Two processes building the ring from the same instance list agree on
/// every key's owner, and data written by one is found by the other.
#[tokio::test]
async fn test_processes_agree_on_ownership() {
    let c = IntegrationCluster::new(4);
    let a = c.facade();
    let b = c.facade();

    for key in keys("order", 200) {
        assert_eq!(
            a.ring().resolve_index(&key),
            b.ring().resolve_index(&key),
            "{key}"
        );
        a.write_string(&key, "placed", None).await.unwrap();
        assert_eq!(b.get_value(&key).await.unwrap().as_deref(), Some("placed"));
    }
}

/// Every key lives on exactly the instance the ring names, and nowhere else.
#[tokio::test]
async fn test_keys_stored_only_on_owner() {
    let c = IntegrationCluster::new(5);
    let facade = c.facade();

    for key in keys("cart", 150) {
        facade.increment_and_get(&key, 1).await.unwrap();
        let owner = facade.ring().resolve_index(&key);
        assert_eq!(c.holders_of(&key).await, vec![owner], "{key}");
    }

    // With 150 keys over 5 instances, none should be left empty.
    for i in 0..c.len() {
        assert!(!c.store(i).is_empty(), "instance {i} owns no keys");
    }
}

#[tokio::test]
async fn test_single_instance_owns_everything() {
    let c = IntegrationCluster::new(1);
    let facade = c.facade();
    for key in keys("any", 50) {
        facade.write_string(&key, "v", None).await.unwrap();
    }
    assert_eq!(c.store(0).len(), 50);
}

/// Loose balance check: vnode positions may collide and hashing is not
/// perfectly uniform, so only gross skew fails.
#[test]
fn test_distribution_is_roughly_balanced() {
    let ring = Ring::new(vec!["a", "b", "c", "d"], 160).unwrap();
    let sample = keys("user", 40_000);
    let counts = ring.distribution(sample.iter().map(String::as_str));

    assert_eq!(counts.iter().sum::<usize>(), 40_000);
    for (i, &n) in counts.iter().enumerate() {
        let share = n as f64 / 40_000.0;
        assert!((0.15..=0.35).contains(&share), "instance {i} share {share:.3}");
    }
}

/// A position past the last vnode wraps to the owner of the first vnode.
#[test]
fn test_wraparound_past_last_position() {
    let ring = Ring::new(vec!["x", "y", "z"], 160).unwrap();
    let first_owner = ring.resolve_position(ring.first_position());
    assert!(ring.last_position() < u64::MAX);
    assert_eq!(ring.resolve_position(ring.last_position() + 1), first_owner);
    assert_eq!(ring.resolve_position(u64::MAX), first_owner);

    // Keys hash into the same space the ring is searched in.
    for key in keys("probe", 20) {
        assert_eq!(
            ring.resolve_index(&key),
            ring.resolve_position(key_position(&key))
        );
    }
}
