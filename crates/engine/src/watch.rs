//! Long-poll watch on a versioned KV key
//!
//! The race this has to win: a write can land between the watcher's read
//! of the current version and the moment it starts listening. Attaching
//! to the notifier happens under the same per-account update slot every
//! writer publishes under, so the watcher either sees the newer version
//! in its immediate re-read or is already in the listener map when the
//! next publish fires.

use crate::coordinator::Coordinator;
use crate::request::{KvReply, WatchRequest};
use latch_core::error::{Error, Result};
use latch_core::keys::{composite, validate_ident, KV_PREFIX};
use latch_core::records::KvRecord;

/// Default seconds a watch call blocks before giving up
pub const WATCH_TIMEOUT_S: i64 = 30;

impl Coordinator {
    /// Wait up to `timeout_s` for `req.id` to move past `req.version`
    ///
    /// Returns the current record immediately when the stored version
    /// already differs (an absent key counts as version 0). Times out
    /// with [`Error::NoChange`].
    pub fn watch(&self, account: &str, req: &WatchRequest, timeout_s: i64) -> Result<KvReply> {
        validate_ident(account)?;
        validate_ident(&req.id)?;

        let key = composite(KV_PREFIX, account, &req.id);
        let notifier = self.notifiers.account(account);
        {
            let _slot = self.slots.lock(account.as_bytes());
            let current = self.read_kv(&key, &req.id)?;
            if current.version != req.version {
                return Ok(current);
            }
            notifier.attach(&req.id);
        }

        match notifier.listen(&req.id, req.version, timeout_s) {
            None => Err(Error::NoChange),
            // Reread outside the slot; the publish that woke us is durable
            Some(_) => self.read_kv(&key, &req.id),
        }
    }

    fn read_kv(&self, key: &[u8], id: &str) -> Result<KvReply> {
        match self.store.get(key)? {
            Some(data) => {
                let record = KvRecord::decode(&data)?;
                Ok(KvReply {
                    key: id.to_string(),
                    value: record.data,
                    version: record.version,
                })
            }
            None => Ok(KvReply {
                key: id.to_string(),
                ..Default::default()
            }),
        }
    }
}
