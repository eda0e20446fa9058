//! # latchdb
//!
//! A single-node coordination and small-state store: an HTTP API over an
//! embedded log-structured KV engine. Clients submit batched requests
//! mixing distributed-lock operations, atomic counter updates,
//! idempotency checks, versioned KV reads and writes, and long-poll
//! watches on versioned keys. Built for microservice coordination:
//! leader election, configuration distribution, mutual exclusion,
//! membership tracking, at high request rates on one node.
//!
//! The interesting machinery sits below the API:
//! - a sharded keyed mutex serializing updates per account
//! - an in-memory lock manager with expiry, handles, and restart recovery
//! - a group-commit flusher amortizing one fsync over many writers
//! - a per-account version notifier waking long-poll watchers
//! - a request coordinator sequencing lock, batch, durability, release,
//!   and notification so an unlock is never observable before the writes
//!   it guarded are on disk
//!
//! # Quick start
//!
//! ```no_run
//! use latchdb::{Coordinator, Request, SledStore};
//! use std::sync::Arc;
//!
//! fn main() -> latchdb::Result<()> {
//!     let store = Arc::new(SledStore::open("./latch-data", 256 << 20)?);
//!     let node = Arc::new(Coordinator::new(store));
//!     node.recover_locks()?;
//!     let flush_thread = node.flusher().spawn();
//!
//!     let req = Request {
//!         lock_id: "leader".to_string(),
//!         lock_dur: 30,
//!         ..Default::default()
//!     };
//!     let reply = node.execute("my-service", &req)?;
//!     println!("lock handle: {}", reply.lock);
//!
//!     node.flusher().stop();
//!     let _ = flush_thread.join();
//!     Ok(())
//! }
//! ```
//!
//! The `latchd` binary wires the same pieces behind the HTTP surface.
//! Internal crates (storage, concurrency, durability) are implementation
//! detail; this surface is the stable one.

pub use latch_api::{serve, Config};
pub use latch_core::{Error, Result};
pub use latch_engine::{
    AtomicOp, AtomicReply, Coordinator, KvReply, KvSetOp, RecoveryStats, Request, Response,
    WatchRequest,
};
pub use latch_storage::SledStore;
