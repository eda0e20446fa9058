//! Sharded keyed mutex bank: the per-account update slots
//!
//! Every mutation of an account's records happens while that account's
//! slot is held, which serializes read-modify-write cycles per account
//! without a global lock. Keys hash to one of a fixed number of shards;
//! a condvar with many waiters degrades under contention, so sharding
//! cuts the wakeup fanout by the shard count at the cost of occasional
//! false collisions between unrelated keys in the same shard.

use latch_core::keys::shard_hash;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;

/// Number of independent mutex/condvar shards
const SLOT_SHARDS: u64 = 100;

struct Shard {
    // 64-bit key hashes currently locked through this shard
    held: Mutex<HashSet<u64>>,
    freed: Condvar,
}

/// Bank of keyed mutexes; `lock` blocks until the key's slot is free
pub struct SlotBank {
    shards: Vec<Shard>,
}

impl SlotBank {
    /// Create a bank with the standard shard count
    pub fn new() -> Self {
        let shards = (0..SLOT_SHARDS)
            .map(|_| Shard {
                held: Mutex::new(HashSet::new()),
                freed: Condvar::new(),
            })
            .collect();
        SlotBank { shards }
    }

    /// Take the slot for `key`, waiting for the current holder if any
    ///
    /// The returned guard frees the slot when dropped, so every exit path
    /// of the critical section unlocks.
    pub fn lock(&self, key: &[u8]) -> SlotGuard<'_> {
        let hash = shard_hash(key);
        let shard = &self.shards[(hash % SLOT_SHARDS) as usize];
        let mut held = shard.held.lock();
        while held.contains(&hash) {
            shard.freed.wait(&mut held);
        }
        held.insert(hash);
        SlotGuard { bank: self, hash }
    }

    fn unlock(&self, hash: u64) {
        let shard = &self.shards[(hash % SLOT_SHARDS) as usize];
        let mut held = shard.held.lock();
        held.remove(&hash);
        shard.freed.notify_all();
    }
}

impl Default for SlotBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one key's update slot; dropping releases it
pub struct SlotGuard<'a> {
    bank: &'a SlotBank,
    hash: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.bank.unlock(self.hash);
    }
}
