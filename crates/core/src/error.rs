//! Error types for latchdb
//!
//! A single `Error` enum covers the whole system. We use `thiserror` for
//! automatic `Display` and `Error` trait implementations.
//!
//! The display strings of several variants are part of the HTTP surface:
//! every failure is returned to the client as a 400 with the display string
//! as a plain-text body, so `NotLocked`, `Stopped`, `NoChange` and
//! `Duplicate` render exactly the bodies clients match on.

use thiserror::Error;

/// Result type alias for latchdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all latchdb operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: bad account or id, out-of-range field
    #[error("{0}")]
    Validation(String),

    /// Lock acquisition gave up before the wait deadline produced a free lock
    #[error("not_locked")]
    NotLocked,

    /// Extend or release presented a handle that does not own the lock
    #[error("handle mismatch")]
    HandleMismatch,

    /// Extend targeted a lock that is not held
    #[error("lock not found")]
    LockNotFound,

    /// Idempotency ID was already recorded by an earlier request
    #[error("duplicate request: {0}")]
    Duplicate(String),

    /// Underlying engine read/write failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Stored record failed to encode or decode
    #[error("codec error: {0}")]
    Codec(String),

    /// Shutdown has begun; new requests are rejected
    #[error("DB stopped")]
    Stopped,

    /// A watch reached its deadline without observing a version change
    #[error("no change")]
    NoChange,
}

impl Error {
    /// Create a `Validation` error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a `Storage` error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a `Codec` error
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Lock-contention failures: the caller may retry after backing off
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::NotLocked)
    }

    /// Input errors: retrying the same request cannot succeed
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Duplicate(_))
    }

    /// Storage-layer failures, including codec errors on stored records
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Codec(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
