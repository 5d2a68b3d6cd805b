//! Tests for save/restore: observable state round-trips, expirations are reduced by the time that
//! passed between save and restore, timers re-arm, and watcher state does not survive.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::clock::ManualClock;
use common::{index, new_store, term};
use keytree_rs::{Clock, EventKind, KeyTree, LogIndex, StoreConfig, SystemClock};

#[test]
fn restore_of_a_save_is_the_identity_on_observable_state() {
    let store = new_store();
    store.create("/foo", "bar", None, index(1), term(1)).unwrap();
    store.create("/dir/child", "v", None, index(2), term(1)).unwrap();

    let snapshot = store.save();

    // Diverge, then roll back.
    store.delete("/foo", false, index(3), term(1)).unwrap();
    store.create("/extra", "x", None, index(4), term(1)).unwrap();
    store.restore(&snapshot).unwrap();

    assert_eq!(store.current_index(), (index(2), term(1)));

    let foo = store.get("/foo", false, false, index(5), term(1)).unwrap();
    assert_eq!(foo.value.as_deref(), Some("bar"));
    let listing = store.get("/dir", true, true, index(6), term(1)).unwrap();
    assert_eq!(listing.children.len(), 1);
    assert_eq!(listing.children[0].key, "/dir/child");
    assert_eq!(store.get("/extra", false, false, index(7), term(1)).unwrap_err().code(), 100);

    // The modified stamps round-tripped: a guard on the creating index still matches.
    store
        .compare_and_swap("/foo", "", index(1), "baz", None, index(8), term(1))
        .unwrap();
}

#[test]
fn acl_tags_survive_a_round_trip() {
    let identity = common::identity::SwitchableIdentity::new("alice");
    let config = StoreConfig {
        identity: Arc::clone(&identity) as Arc<dyn keytree_rs::IdentityProvider>,
        ..StoreConfig::default()
    };
    let store = KeyTree::new(config);

    store.create("/ACL/a/r/alice", "1", None, index(1), term(1)).unwrap();
    store.create("/secret", "v", None, index(2), term(1)).unwrap();
    store.set_acl("/secret", "a").unwrap();

    let snapshot = store.save();
    store.restore(&snapshot).unwrap();

    assert!(store.get("/secret", false, false, index(3), term(1)).is_ok());
    identity.switch("bob");
    assert_eq!(store.get("/secret", false, false, index(4), term(1)).unwrap_err().code(), 107);
}

#[test]
fn restore_drops_nodes_that_expired_while_saved() {
    let clock = ManualClock::new(1_000_000);
    let config = StoreConfig {
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        ..StoreConfig::default()
    };
    let store = KeyTree::new(config);

    store.create("/perm", "v", None, index(1), term(1)).unwrap();
    store
        .create("/tmp", "v", Some(keytree_rs::Timestamp::new(1_010_000)), index(2), term(1))
        .unwrap();

    let snapshot = store.save();
    clock.advance(60_000);
    store.restore(&snapshot).unwrap();

    assert!(store.get("/perm", false, false, index(3), term(1)).is_ok());
    assert_eq!(store.get("/tmp", false, false, index(4), term(1)).unwrap_err().code(), 100);
}

#[test]
fn restore_rearms_timers_for_surviving_nodes() {
    let store = new_store();
    let due = SystemClock.now() + Duration::from_millis(500);
    store.create("/tmp", "v", Some(due), index(1), term(1)).unwrap();

    let snapshot = store.save();
    store.restore(&snapshot).unwrap();

    let watcher = store.watch("/tmp", false, LogIndex::new(0)).unwrap();
    let expired = watcher
        .recv_timeout(Duration::from_secs(5))
        .expect("restored TTL node still expires");
    assert_eq!(expired.kind, EventKind::Expire);
    assert_eq!(store.get("/tmp", false, false, index(2), term(1)).unwrap_err().code(), 100);
}

#[test]
fn watchers_do_not_survive_a_restore() {
    let store = new_store();
    let watcher = store.watch("/newpath", false, LogIndex::new(0)).unwrap();

    let snapshot = store.save();
    store.restore(&snapshot).unwrap();

    store.create("/newpath", "v", None, index(1), term(1)).unwrap();
    assert!(watcher.recv_timeout(Duration::from_millis(200)).is_none());
}

#[test]
fn corrupt_snapshots_are_rejected() {
    let store = new_store();
    assert!(store.restore(&[0x00, 0x01, 0x02]).is_err());
}
