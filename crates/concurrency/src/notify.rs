//! Per-account version notifier for long-poll watchers
//!
//! One notifier per account, holding `key → {latest version, listener
//! count}` under a single mutex/condvar pair. A watcher attaches while
//! holding the account's update slot, the same slot every publisher
//! writes under, so no version change can slip between the watcher's
//! database read and its presence in the listener map.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct WatchRecord {
    version: i64,
    listeners: usize,
}

/// Version-change broadcast for one account's keys
pub struct Notifier {
    state: Mutex<HashMap<String, WatchRecord>>,
    changed: Condvar,
}

impl Notifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Notifier {
            state: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
        }
    }

    /// Register interest in `key` before starting to listen
    ///
    /// Must be called while holding the account's update slot, after
    /// verifying the stored version still matches what the caller saw.
    pub fn attach(&self, key: &str) {
        let mut state = self.state.lock();
        state
            .entry(key.to_string())
            .and_modify(|record| record.listeners += 1)
            .or_insert(WatchRecord {
                version: 0,
                listeners: 1,
            });
    }

    /// Wait until `key`'s version becomes nonzero and differs from
    /// `known_version`, or the deadline passes
    ///
    /// Returns the new version, or `None` on timeout. The listener count
    /// taken in `attach` is returned either way; the record is dropped
    /// when the last listener times out.
    pub fn listen(&self, key: &str, known_version: i64, timeout_s: i64) -> Option<i64> {
        let deadline = Instant::now() + Duration::from_secs(timeout_s.max(0) as u64);
        let mut state = self.state.lock();
        loop {
            if let Some(record) = state.get_mut(key) {
                if record.version != 0 && record.version != known_version {
                    let version = record.version;
                    record.listeners -= 1;
                    return Some(version);
                }
            }
            if Instant::now() >= deadline {
                if let Some(record) = state.get_mut(key) {
                    record.listeners -= 1;
                    if record.listeners == 0 {
                        state.remove(key);
                    }
                }
                return None;
            }
            let _ = self.changed.wait_until(&mut state, deadline);
        }
    }

    /// Record a new version for `key` and wake its listeners
    ///
    /// Called after the write is durable and locks are released. Without
    /// listeners this is a no-op.
    pub fn publish(&self, key: &str, version: i64) {
        let mut state = self.state.lock();
        if let Some(record) = state.get_mut(key) {
            record.version = version;
            self.changed.notify_all();
        }
    }

    #[cfg(test)]
    fn listener_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .get(key)
            .map(|record| record.listeners)
            .unwrap_or(0)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily-created notifier per account
pub struct NotifierRegistry {
    accounts: DashMap<Vec<u8>, Arc<Notifier>>,
}

impl NotifierRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        NotifierRegistry {
            accounts: DashMap::new(),
        }
    }

    /// The notifier for `account`, created on first use
    pub fn account(&self, account: &str) -> Arc<Notifier> {
        self.accounts
            .entry(account.as_bytes().to_vec())
            .or_insert_with(|| Arc::new(Notifier::new()))
            .clone()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
