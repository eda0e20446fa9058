//! In-memory concurrency control for latchdb
//!
//! Three independent pieces, all built on sharded `parking_lot`
//! mutex/condvar pairs:
//! - [`SlotBank`]: keyed mutexes serializing per-account updates
//! - [`LockManager`]: named client-visible locks with handles and expiry
//! - [`Notifier`]/[`NotifierRegistry`]: version-change broadcast for
//!   long-poll watchers

#![warn(missing_docs)]
#![warn(clippy::all)]

mod locks;
mod notify;
mod slots;

pub use locks::LockManager;
pub use notify::{Notifier, NotifierRegistry};
pub use slots::{SlotBank, SlotGuard};
