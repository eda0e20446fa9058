//! Core types for latchdb
//!
//! This crate defines the foundations shared by every layer:
//! - `Error` / `Result`: the unified error type (display strings double as
//!   HTTP error bodies)
//! - `keys`: composite key construction, namespace prefixes, id validation,
//!   the LE int64 codec, and the shard hash
//! - `records`: persisted record layouts (msgpack lock and KV records,
//!   idempotency markers)
//! - `store`: the `Store` trait seam over the embedded ordered KV engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod keys;
pub mod records;
pub mod store;

pub use error::{Error, Result};
pub use records::{KvRecord, LockRecord};
pub use store::{BatchOp, Store};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix seconds
///
/// Lock expiries, idempotency markers, and watch deadlines are all second
/// granularity; a clock before the epoch reads as zero.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_now_is_sane() {
        // 2023-01-01 as a floor; catches a zeroed or misread clock
        assert!(unix_now() > 1_672_531_200);
    }
}
