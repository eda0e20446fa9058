//! Shared harness: a coordinator over a real on-disk store with a live
//! flush loop, torn down cleanly so databases can be reopened.

#![allow(dead_code)]

use latch_core::store::Store;
use latch_engine::{AtomicOp, Coordinator, KvSetOp, Request};
use latch_storage::SledStore;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct TestNode {
    pub node: Arc<Coordinator>,
    flush_thread: Option<JoinHandle<()>>,
}

impl TestNode {
    pub fn new() -> Self {
        Self::build(SledStore::temporary().unwrap(), |node| node)
    }

    pub fn new_with(tune: impl FnOnce(Coordinator) -> Coordinator) -> Self {
        Self::build(SledStore::temporary().unwrap(), tune)
    }

    pub fn open_at(path: &Path) -> Self {
        Self::build(SledStore::open(path, 64 << 20).unwrap(), |node| node)
    }

    fn build(store: SledStore, tune: impl FnOnce(Coordinator) -> Coordinator) -> Self {
        let store: Arc<dyn Store> = Arc::new(store);
        let node = Arc::new(tune(Coordinator::new(store)));
        node.recover_locks().unwrap();
        let flush_thread = node.flusher().spawn();
        TestNode {
            node,
            flush_thread: Some(flush_thread),
        }
    }
}

impl std::ops::Deref for TestNode {
    type Target = Coordinator;

    fn deref(&self) -> &Coordinator {
        &self.node
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.node.flusher().stop();
        if let Some(thread) = self.flush_thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn add(key: &str, delta: i64) -> Request {
    Request {
        atomic: vec![AtomicOp {
            key: key.to_string(),
            add: delta,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn set_if_eq(key: &str, target: i64, expect: i64) -> Request {
    Request {
        atomic: vec![AtomicOp {
            key: key.to_string(),
            set: Some(target),
            if_eq: Some(expect),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn kv_set(key: &str, value: &[u8]) -> Request {
    Request {
        kv_set: vec![KvSetOp {
            key: key.to_string(),
            value: value.to_vec(),
            delete: false,
        }],
        ..Default::default()
    }
}

pub fn kv_delete(key: &str) -> Request {
    Request {
        kv_set: vec![KvSetOp {
            key: key.to_string(),
            delete: true,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn kv_get(key: &str) -> Request {
    Request {
        kv_get: vec![key.to_string()],
        ..Default::default()
    }
}

pub fn acquire(lock_id: &str, dur_s: i64, wait_s: i64) -> Request {
    Request {
        lock_id: lock_id.to_string(),
        lock_dur: dur_s,
        lock_wait: wait_s,
        ..Default::default()
    }
}

pub fn unlock(lock_id: &str, handle: i64) -> Request {
    Request {
        unlock_id: lock_id.to_string(),
        unlock: handle,
        ..Default::default()
    }
}
