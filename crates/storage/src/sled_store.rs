//! sled-backed implementation of the [`Store`] seam
//!
//! sled is opened with `flush_every_ms(None)`: the engine never syncs on
//! its own schedule. Batches applied through [`Store::apply`] are atomic
//! but sit in the engine's buffers until someone calls
//! [`Store::log_sync`]. During normal operation that someone is the
//! group-commit flusher, which turns many concurrent writers into one
//! fsync. `put_sync`/`delete_sync` exist for the lock-only paths that
//! must be durable before the response leaves the process.

use latch_core::error::{Error, Result};
use latch_core::store::{BatchOp, Store};
use std::path::Path;
use tracing::info;

/// Embedded ordered KV engine handle
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) a database at `path`
    ///
    /// `cache_bytes` bounds the engine's in-memory page cache.
    pub fn open(path: impl AsRef<Path>, cache_bytes: u64) -> Result<Self> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(cache_bytes)
            .flush_every_ms(None)
            .open()
            .map_err(|e| Error::storage(e.to_string()))?;
        info!(path = %path.as_ref().display(), "database opened");
        Ok(SledStore { db })
    }

    /// Open a throwaway database backed by a temp location (tests)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .flush_every_ms(None)
            .open()
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(SledStore { db })
    }
}

impl Store for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key)
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, prefix: u8) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut records = Vec::new();
        for item in self.db.scan_prefix([prefix]) {
            let (key, value) = item.map_err(|e| Error::storage(e.to_string()))?;
            records.push((key.to_vec(), value.to_vec()));
        }
        Ok(records)
    }

    fn apply(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => batch.insert(key, value),
                BatchOp::Delete { key } => batch.remove(key),
            }
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| Error::storage(e.to_string()))
    }

    fn put_sync(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .insert(key, value)
            .map_err(|e| Error::storage(e.to_string()))?;
        self.log_sync()
    }

    fn delete_sync(&self, key: &[u8]) -> Result<()> {
        self.db
            .remove(key)
            .map_err(|e| Error::storage(e.to_string()))?;
        self.log_sync()
    }

    fn log_sync(&self) -> Result<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| Error::storage(e.to_string()))
    }
}
