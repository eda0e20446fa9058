//! Long-poll watch behavior

mod common;

use common::*;
use latch_core::error::Error;
use latch_engine::WatchRequest;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn watch_req(id: &str, version: i64) -> WatchRequest {
    WatchRequest {
        id: id.to_string(),
        version,
    }
}

#[test]
fn test_watch_returns_immediately_on_version_mismatch() {
    let node = TestNode::new();
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    // known_version = 0 on an existing key: no waiting
    let start = Instant::now();
    let reply = node.watch("acct", &watch_req("k", 0), 30).unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(reply.value, b"v1");
    assert_eq!(reply.version, 1);
}

#[test]
fn test_watch_absent_key_with_nonzero_version_returns_immediately() {
    let node = TestNode::new();
    let reply = node.watch("acct", &watch_req("ghost", 7), 30).unwrap();
    assert_eq!(reply.version, 0);
    assert!(reply.value.is_empty());
}

#[test]
fn test_watch_wakes_on_set() {
    let node = Arc::new(TestNode::new());

    let node2 = Arc::clone(&node);
    let watcher = thread::spawn(move || node2.watch("acct", &watch_req("k", 0), 10));

    thread::sleep(Duration::from_millis(100));
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    let reply = watcher.join().unwrap().unwrap();
    assert_eq!(reply.key, "k");
    assert_eq!(reply.value, b"v1");
    assert_eq!(reply.version, 1);
}

#[test]
fn test_watch_wakes_on_version_advance() {
    let node = Arc::new(TestNode::new());
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    let node2 = Arc::clone(&node);
    let watcher = thread::spawn(move || node2.watch("acct", &watch_req("k", 1), 10));

    thread::sleep(Duration::from_millis(100));
    node.execute("acct", &kv_set("k", b"v2")).unwrap();

    let reply = watcher.join().unwrap().unwrap();
    assert_eq!(reply.value, b"v2");
    assert_eq!(reply.version, 2);
}

#[test]
fn test_watch_times_out_with_no_change() {
    let node = TestNode::new();
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    let start = Instant::now();
    let err = node.watch("acct", &watch_req("k", 1), 1).unwrap_err();
    assert!(matches!(err, Error::NoChange));
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[test]
fn test_watch_set_then_watch_previous_version() {
    // set(k) followed by watch(k, version - 1) returns immediately
    let node = TestNode::new();
    node.execute("acct", &kv_set("k", b"a")).unwrap();
    node.execute("acct", &kv_set("k", b"b")).unwrap();

    let reply = node.watch("acct", &watch_req("k", 1), 30).unwrap();
    assert_eq!(reply.value, b"b");
    assert_eq!(reply.version, 2);
}

#[test]
fn test_watch_sees_delete_as_version_zero() {
    let node = Arc::new(TestNode::new());
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    let node2 = Arc::clone(&node);
    let watcher = thread::spawn(move || node2.watch("acct", &watch_req("k", 1), 10));

    thread::sleep(Duration::from_millis(100));
    node.execute("acct", &kv_delete("k")).unwrap();

    let reply = watcher.join().unwrap().unwrap();
    assert_eq!(reply.version, 0);
    assert!(reply.value.is_empty());
}

#[test]
fn test_multiple_watchers_all_wake() {
    let node = Arc::new(TestNode::new());

    let mut watchers = Vec::new();
    for _ in 0..4 {
        let node = Arc::clone(&node);
        watchers.push(thread::spawn(move || {
            node.watch("acct", &watch_req("k", 0), 10)
        }));
    }

    thread::sleep(Duration::from_millis(150));
    node.execute("acct", &kv_set("k", b"v1")).unwrap();

    for watcher in watchers {
        let reply = watcher.join().unwrap().unwrap();
        assert_eq!(reply.version, 1);
    }
}

#[test]
fn test_watchers_on_different_accounts_do_not_cross() {
    let node = Arc::new(TestNode::new());

    let node2 = Arc::clone(&node);
    let watcher = thread::spawn(move || node2.watch("acct-a", &watch_req("k", 0), 2));

    thread::sleep(Duration::from_millis(100));
    // A write to another account's identical key must not wake the watcher
    node.execute("acct-b", &kv_set("k", b"v")).unwrap();

    assert!(matches!(watcher.join().unwrap(), Err(Error::NoChange)));
}
