//! In-memory lock manager
//!
//! Named advisory locks with timeouts, opaque 64-bit handles, extension,
//! and restart reinstall. Uses its own sharded mutex bank, separate from
//! the update-slot serializer, guarding `key → {release signal, handle,
//! till}` maps.
//!
//! Each held lock has a dedicated expiry thread armed with the lock's
//! deadline. The thread holds only weak identity (the key, the handle,
//! and a snapshot of `till`), never a reference into the map, and
//! re-checks identity under the shard lock before expiring. The release
//! signal is the sender half of a channel stored in the record: removing
//! the record drops the sender, and the expiry thread observes the hangup
//! and exits without touching the map.

use latch_core::error::{Error, Result};
use latch_core::keys::shard_hash;
use latch_core::unix_now;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of lock-map shards
const LOCK_SHARDS: u64 = 100;

struct Held {
    // Dropped when the record leaves the map; the expiry thread watches
    // the receiving end for the hangup.
    _release_tx: mpsc::Sender<()>,
    handle: i64,
    till: i64,
}

struct LockShard {
    held: Mutex<HashMap<Vec<u8>, Held>>,
    freed: Condvar,
}

struct Inner {
    shards: Vec<LockShard>,
    next_handle: AtomicI64,
}

impl Inner {
    fn shard(&self, key: &[u8]) -> &LockShard {
        &self.shards[(shard_hash(key) % LOCK_SHARDS) as usize]
    }
}

/// Named-lock manager with expiry and handle validation
pub struct LockManager {
    inner: Arc<Inner>,
}

impl LockManager {
    /// Create an empty manager; handles start at 1
    pub fn new() -> Self {
        let shards = (0..LOCK_SHARDS)
            .map(|_| LockShard {
                held: Mutex::new(HashMap::new()),
                freed: Condvar::new(),
            })
            .collect();
        LockManager {
            inner: Arc::new(Inner {
                shards,
                next_handle: AtomicI64::new(1),
            }),
        }
    }

    /// Acquire `key` for `dur_s` seconds, waiting up to `wait_s` seconds
    ///
    /// Returns the freshly allocated handle. `wait_s == 0` fails
    /// immediately when the lock is held. Waiters park on the shard
    /// condvar with a deadline, so a timeout is observed even if no
    /// release ever broadcasts.
    pub fn acquire(&self, key: &[u8], dur_s: i64, wait_s: i64) -> Result<i64> {
        let deadline = Instant::now() + Duration::from_secs(wait_s.max(0) as u64);
        let shard = self.inner.shard(key);
        let mut held = shard.held.lock();
        while held.contains_key(key) {
            if wait_s <= 0 || Instant::now() >= deadline {
                return Err(Error::NotLocked);
            }
            let _ = shard.freed.wait_until(&mut held, deadline);
        }
        let handle = self.inner.next_handle.fetch_add(1, Ordering::SeqCst);
        let dur = Duration::from_secs(dur_s.max(0) as u64);
        let till = unix_now() + dur_s.max(0);
        self.install_locked(&mut held, key, handle, dur, till);
        Ok(handle)
    }

    /// Reinstall a lock during restart recovery with its original handle
    ///
    /// The map must not already hold the key; recovery runs before any
    /// client traffic, so a collision means the startup scan is broken.
    pub fn reinstall(&self, key: &[u8], handle: i64, till: i64) -> Result<()> {
        let shard = self.inner.shard(key);
        let mut held = shard.held.lock();
        if held.contains_key(key) {
            return Err(Error::storage(
                "duplicate lock record encountered during recovery",
            ));
        }
        let remaining = Duration::from_secs((till - unix_now()).max(0) as u64);
        self.install_locked(&mut held, key, handle, remaining, till);
        Ok(())
    }

    fn install_locked(
        &self,
        held: &mut HashMap<Vec<u8>, Held>,
        key: &[u8],
        handle: i64,
        dur: Duration,
        till: i64,
    ) {
        let (release_tx, release_rx) = mpsc::channel();
        held.insert(
            key.to_vec(),
            Held {
                _release_tx: release_tx,
                handle,
                till,
            },
        );
        let inner = Arc::clone(&self.inner);
        let key = key.to_vec();
        std::thread::Builder::new()
            .name("latch-lock-expiry".to_string())
            .spawn(move || expiry_loop(&inner, &key, handle, dur, till, &release_rx))
            .expect("failed to spawn lock expiry thread");
    }

    /// Move `key`'s expiry to `now + dur_s`; the live expiry thread rearms
    ///
    /// `handle == 0` skips the ownership check (recovery and
    /// administrative paths). Returns the owning handle and the new
    /// `till`, so unchecked callers still learn the real owner.
    pub fn extend(&self, key: &[u8], handle: i64, dur_s: i64) -> Result<(i64, i64)> {
        let shard = self.inner.shard(key);
        let mut held = shard.held.lock();
        let record = held.get_mut(key).ok_or(Error::LockNotFound)?;
        if handle != 0 && record.handle != handle {
            return Err(Error::HandleMismatch);
        }
        record.till = unix_now() + dur_s.max(0);
        Ok((record.handle, record.till))
    }

    /// Release `key`; a missing record is not an error
    ///
    /// `handle == 0` skips the ownership check. Dropping the record hangs
    /// up the release channel, which stops the expiry thread.
    pub fn release(&self, key: &[u8], handle: i64) -> Result<()> {
        let shard = self.inner.shard(key);
        let mut held = shard.held.lock();
        match held.get(key) {
            None => Ok(()),
            Some(record) if handle != 0 && record.handle != handle => Err(Error::HandleMismatch),
            Some(_) => {
                held.remove(key);
                shard.freed.notify_all();
                Ok(())
            }
        }
    }

    /// Never hand out handles at or below `handle` (restart recovery)
    pub fn bump_floor(&self, handle: i64) {
        self.inner.next_handle.fetch_max(handle + 1, Ordering::SeqCst);
    }

    /// Whether `key` is currently held
    pub fn is_held(&self, key: &[u8]) -> bool {
        self.inner.shard(key).held.lock().contains_key(key)
    }

    /// Current `(handle, till)` of `key`, if held
    pub fn peek(&self, key: &[u8]) -> Option<(i64, i64)> {
        let shard = self.inner.shard(key);
        let held = shard.held.lock();
        held.get(key).map(|record| (record.handle, record.till))
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One iteration per armed deadline; exits on release or after expiring
fn expiry_loop(
    inner: &Inner,
    key: &[u8],
    handle: i64,
    dur: Duration,
    mut till: i64,
    release_rx: &Receiver<()>,
) {
    let mut wait = dur;
    loop {
        match release_rx.recv_timeout(wait) {
            // Record left the map: released by its owner or replaced
            Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                let shard = inner.shard(key);
                let mut held = shard.held.lock();
                match held.get(key) {
                    Some(record) if record.handle == handle => {
                        if record.till != till {
                            // Extended since we armed; rearm with the delta
                            // between the old deadline (now, roughly) and
                            // the new one
                            wait = Duration::from_secs((record.till - till).max(0) as u64);
                            till = record.till;
                            continue;
                        }
                        held.remove(key);
                        shard.freed.notify_all();
                        debug!(handle, "lock expired");
                        return;
                    }
                    // Released and possibly re-acquired while the timer fired
                    _ => return,
                }
            }
            Ok(()) => {}
        }
    }
}
