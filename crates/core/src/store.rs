//! Storage abstraction over the embedded ordered KV engine
//!
//! The engine is treated as a black box providing point reads, prefix
//! scans, atomic buffered batches, and two durability primitives: write
//! single records with fsync, and force the engine log to disk. The
//! group-commit flusher is the only caller of [`Store::log_sync`] during
//! normal operation.

use crate::error::Result;

/// One staged mutation inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set `key` to `value`
    Put {
        /// Full composite key
        key: Vec<u8>,
        /// Encoded record
        value: Vec<u8>,
    },
    /// Remove `key` entirely
    Delete {
        /// Full composite key
        key: Vec<u8>,
    },
}

/// Ordered KV engine seam
///
/// All methods are safe to call concurrently. `apply` is atomic but only
/// buffered; its effects become durable at the next `log_sync`. `put_sync`
/// and `delete_sync` return only once the write is on disk.
pub trait Store: Send + Sync {
    /// Point read
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All records under a one-byte namespace prefix, in key order
    fn scan_prefix(&self, prefix: u8) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply a batch atomically; buffered, not yet durable
    fn apply(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Write one record and fsync before returning
    fn put_sync(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete one record and fsync before returning
    fn delete_sync(&self, key: &[u8]) -> Result<()>;

    /// Force the engine log to disk, making all prior buffered writes durable
    fn log_sync(&self) -> Result<()>;
}
