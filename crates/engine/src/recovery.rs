//! Restart recovery for persistent locks
//!
//! Locks survive the process: their records live under the lock prefix
//! with the owning handle and expiry. On startup, before any client
//! traffic, the whole prefix is scanned; live records are reinstalled in
//! the lock manager with their original handle and remaining duration,
//! expired ones are deleted. The handle counter is floored past every
//! handle seen so a handle issued before the restart can never be issued
//! again.

use crate::coordinator::Coordinator;
use latch_core::error::Result;
use latch_core::keys::{mem_key_from_disk, LOCK_PREFIX};
use latch_core::records::LockRecord;
use latch_core::unix_now;
use tracing::info;

/// What the startup lock scan found
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Live locks reinstalled with their original handles
    pub reinstalled: usize,
    /// Expired records deleted from the store
    pub expired: usize,
}

impl Coordinator {
    /// Scan the lock prefix and rebuild in-memory lock state
    ///
    /// Must run before the HTTP surface accepts requests. A record that
    /// fails to decode aborts startup: that is corruption, not something
    /// to limp past.
    pub fn recover_locks(&self) -> Result<RecoveryStats> {
        let now = unix_now();
        let mut stats = RecoveryStats::default();
        for (disk_key, value) in self.store.scan_prefix(LOCK_PREFIX)? {
            let record = LockRecord::decode(&value)?;
            if record.till <= now {
                self.store.delete_sync(&disk_key)?;
                stats.expired += 1;
                continue;
            }
            self.locks.bump_floor(record.handle);
            self.locks
                .reinstall(mem_key_from_disk(&disk_key), record.handle, record.till)?;
            stats.reinstalled += 1;
        }
        info!(
            reinstalled = stats.reinstalled,
            expired = stats.expired,
            "lock recovery complete"
        );
        Ok(stats)
    }
}
