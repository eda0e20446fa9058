//! Request engine for latchdb
//!
//! Ties the concurrency and durability services together behind the
//! [`Coordinator`]: mixed-request execution, long-poll watches, and
//! restart recovery of persistent locks. The wire DTOs live here too so
//! the HTTP layer stays a thin shell.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod coordinator;
mod recovery;
mod request;
mod watch;

pub use coordinator::{Coordinator, UNLOCK_GRACE_S};
pub use recovery::RecoveryStats;
pub use request::{AtomicOp, AtomicReply, KvReply, KvSetOp, Request, Response, WatchRequest};
pub use watch::WATCH_TIMEOUT_S;
