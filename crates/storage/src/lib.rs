//! Storage layer for latchdb
//!
//! Wraps the embedded ordered KV engine (sled) behind the
//! [`latch_core::Store`] seam and provides the read-through
//! [`WriteBatch`] used for per-account read-modify-write.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod sled_store;

pub use batch::WriteBatch;
pub use sled_store::SledStore;
