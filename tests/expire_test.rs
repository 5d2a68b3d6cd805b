//! Tests for the TTL subsystem: expiration firing, cancellation on update, re-arming, and the TTL
//! accounting carried on events. Firing tests run against the real clock with deliberately loose
//! deadlines; accounting tests pin the clock manually.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::clock::ManualClock;
use common::{index, new_store, term};
use keytree_rs::{Clock, EventKind, LogIndex, StoreConfig, SystemClock, Timestamp};

const FIRING: Duration = Duration::from_secs(5);

#[test]
fn nodes_with_ttl_expire_and_notify() {
    let store = new_store();
    let due = SystemClock.now() + Duration::from_millis(300);

    let created = store.create("/tmp", "v", Some(due), index(10), term(1)).unwrap();
    assert_eq!(created.expiration, Some(due));

    let watcher = store.watch("/tmp", false, LogIndex::new(0)).unwrap();
    let expired = watcher.recv_timeout(FIRING).expect("expiration fires");
    assert_eq!(expired.kind, EventKind::Expire);
    assert_eq!(expired.path, "/tmp");
    assert_eq!(expired.prev_value.as_deref(), Some("v"));
    // The expiration is applied at the store's current log position.
    assert_eq!(expired.index, index(10));

    let read = store.get("/tmp", false, false, index(11), term(1)).unwrap_err();
    assert_eq!(read.code(), 100);
}

#[test]
fn expired_directories_take_their_subtree_with_them() {
    let store = new_store();
    store.create("/box/keep", "v", None, index(1), term(1)).unwrap();

    let due = SystemClock.now() + Duration::from_millis(300);
    store.update("/box", "", Some(due), index(2), term(1)).unwrap();

    let watcher = store.watch("/box", true, LogIndex::new(0)).unwrap();
    let removal = watcher.recv_timeout(FIRING).expect("subtree removal notifies");
    assert_eq!(removal.kind, EventKind::Expire);
    assert_eq!(removal.path, "/box/keep");

    assert_eq!(store.get("/box", false, false, index(3), term(1)).unwrap_err().code(), 100);
}

#[test]
fn updating_to_permanent_cancels_the_timer() {
    let store = new_store();
    let due = SystemClock.now() + Duration::from_millis(300);
    store.create("/tmp", "v", Some(due), index(1), term(1)).unwrap();

    store.update("/tmp", "", None, index(2), term(1)).unwrap();

    std::thread::sleep(Duration::from_millis(1500));
    let read = store.get("/tmp", false, false, index(3), term(1)).unwrap();
    assert_eq!(read.value.as_deref(), Some("v"));
}

#[test]
fn updating_with_a_ttl_arms_a_fresh_timer() {
    let store = new_store();
    store.create("/tmp", "v", None, index(1), term(1)).unwrap();

    let due = SystemClock.now() + Duration::from_millis(300);
    let updated = store.update("/tmp", "", Some(due), index(2), term(1)).unwrap();
    assert_eq!(updated.expiration, Some(due));

    let watcher = store.watch("/tmp", false, LogIndex::new(0)).unwrap();
    assert_eq!(watcher.recv_timeout(FIRING).unwrap().kind, EventKind::Expire);
    assert_eq!(store.get("/tmp", false, false, index(3), term(1)).unwrap_err().code(), 100);
}

#[test]
fn replacing_a_ttl_reschedules_rather_than_doubles() {
    let store = new_store();
    let soon = SystemClock.now() + Duration::from_millis(300);
    store.create("/tmp", "v", Some(soon), index(1), term(1)).unwrap();

    // Push the deadline out before the first timer fires; the earlier arming must be a tombstone.
    let later = SystemClock.now() + Duration::from_secs(120);
    store.update("/tmp", "", Some(later), index(2), term(1)).unwrap();

    std::thread::sleep(Duration::from_millis(1500));
    let read = store.get("/tmp", false, false, index(3), term(1)).unwrap();
    assert_eq!(read.value.as_deref(), Some("v"));
}

#[test]
fn events_carry_ttl_accounting() {
    let clock = ManualClock::new(1_000_000);
    let config = StoreConfig {
        clock: clock.clone() as Arc<dyn Clock>,
        ..StoreConfig::default()
    };
    let store = keytree_rs::KeyTree::new(config);

    // 5.5 seconds out: whole seconds round down.
    let due = Timestamp::new(1_005_500);
    let created = store.create("/tmp", "v", Some(due), index(1), term(1)).unwrap();
    assert_eq!(created.expiration, Some(due));
    assert_eq!(created.ttl, Some(5));

    // A deadline in the past clamps to zero instead of going negative.
    let stale = Timestamp::new(999_000);
    let updated = store.update("/tmp", "", Some(stale), index(2), term(1)).unwrap();
    assert_eq!(updated.ttl, Some(0));
}

#[test]
fn deleting_a_ttl_node_cancels_its_timer() {
    let store = new_store();
    let due = SystemClock.now() + Duration::from_millis(400);
    store.create("/tmp", "v", Some(due), index(1), term(1)).unwrap();
    store.delete("/tmp", false, index(2), term(1)).unwrap();

    // Recreate the path as permanent; the old timer must not take the new node down.
    store.create("/tmp", "w", None, index(3), term(1)).unwrap();
    std::thread::sleep(Duration::from_millis(1500));
    let read = store.get("/tmp", false, false, index(4), term(1)).unwrap();
    assert_eq!(read.value.as_deref(), Some("w"));
}
