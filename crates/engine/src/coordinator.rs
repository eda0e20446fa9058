//! Request coordinator
//!
//! Sequences one mixed request through its phases:
//!
//! 1. Lock phase, in RAM: extend, stage-unlock, or acquire before any
//!    data is touched, so contention fails fast and exclusion covers the
//!    whole batch.
//! 2. Batch phase, under the account's update slot: idempotency checks,
//!    counters, KV reads, versioned KV writes, all staged in one
//!    read-through batch and applied to the engine buffered.
//! 3. Durability wait on the flusher's generation gate.
//! 4. Release: a newly-acquired lock rolls back if the batch failed (its
//!    persistent record never committed); a requested unlock becomes
//!    observable only after the staged delete is durable.
//! 5. Version notifications to the account's watchers.
//!
//! Lock-only requests skip the batch and write their lock records with an
//! immediate fsync instead.

use crate::request::{AtomicReply, KvReply, Request, Response};
use latch_concurrency::{LockManager, NotifierRegistry, SlotBank};
use latch_core::error::{Error, Result};
use latch_core::keys::{
    account_key, composite, mem_key, validate_ident, ATOMIC_PREFIX, IDEMPOTENCY_PREFIX, KV_PREFIX,
    LOCK_PREFIX, VERSION_SEQ_PREFIX,
};
use latch_core::records::{idempotency_marker, marker_expires_at, KvRecord, LockRecord};
use latch_core::store::Store;
use latch_core::unix_now;
use latch_durability::Flusher;
use latch_storage::WriteBatch;
use std::sync::Arc;
use tracing::{debug, warn};

/// Seconds a lock pending release stays alive while its batch commits
///
/// Without this, a lock at the end of its duration could expire mid-commit
/// and hand exclusion to another client before the unlock is durable.
pub const UNLOCK_GRACE_S: i64 = 30;

const DEFAULT_IDEMPOTENCY_TTL_S: i64 = 24 * 60 * 60;

// Lock-record mutation decided in the lock phase, written in the batch
// phase (mixed requests) or synchronously (lock-only requests)
enum LockWrite {
    Put { key: Vec<u8>, record: LockRecord },
    Delete { key: Vec<u8> },
}

/// The services behind the HTTP surface, wired together
///
/// One instance per process; handlers share it behind an `Arc`. Holds the
/// engine handle, the update-slot bank, the lock manager, the per-account
/// notifiers, and the group-commit flusher.
pub struct Coordinator {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) slots: SlotBank,
    pub(crate) locks: LockManager,
    pub(crate) notifiers: NotifierRegistry,
    pub(crate) flusher: Arc<Flusher>,
    idempotency_ttl_s: i64,
}

impl Coordinator {
    /// Wire up all services over `store`
    ///
    /// The flusher is created but not running; spawn it before serving
    /// traffic and run [`crate::RecoveryStats`]-producing lock recovery
    /// first.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let flusher = Arc::new(Flusher::new(Arc::clone(&store)));
        Coordinator {
            store,
            slots: SlotBank::new(),
            locks: LockManager::new(),
            notifiers: NotifierRegistry::new(),
            flusher,
            idempotency_ttl_s: DEFAULT_IDEMPOTENCY_TTL_S,
        }
    }

    /// Override how long idempotency markers are honored
    pub fn with_idempotency_ttl(mut self, ttl_s: i64) -> Self {
        self.idempotency_ttl_s = ttl_s;
        self
    }

    /// The group-commit flusher; the caller owns its lifecycle
    pub fn flusher(&self) -> &Arc<Flusher> {
        &self.flusher
    }

    /// Execute one mixed request for `account`
    pub fn execute(&self, account: &str, req: &Request) -> Result<Response> {
        validate_request(account, req)?;

        let lock_only = req.is_lock_only();
        let extend = !req.lock_id.is_empty() && req.lock_id == req.unlock_id;
        debug!(account, lock_only, "executing request");

        let mut response = Response::default();
        let mut lock_writes: Vec<LockWrite> = Vec::new();
        // mem key + handle of a lock acquired by this request, for rollback
        let mut acquired: Option<(Vec<u8>, i64)> = None;

        if extend {
            let (owner, till) =
                self.locks
                    .extend(&mem_key(account, &req.lock_id), req.unlock, req.lock_dur)?;
            lock_writes.push(LockWrite::Put {
                key: composite(LOCK_PREFIX, account, &req.lock_id),
                record: LockRecord {
                    handle: owner,
                    till,
                },
            });
            response.lock = owner;
        } else {
            if !req.unlock_id.is_empty() {
                // Keep exclusion through the commit window; the lock
                // leaves RAM only after the staged delete is durable
                self.locks
                    .extend(&mem_key(account, &req.unlock_id), req.unlock, UNLOCK_GRACE_S)?;
                lock_writes.push(LockWrite::Delete {
                    key: composite(LOCK_PREFIX, account, &req.unlock_id),
                });
            }
            if !req.lock_id.is_empty() {
                let mem = mem_key(account, &req.lock_id);
                let handle = self.locks.acquire(&mem, req.lock_dur, req.lock_wait)?;
                lock_writes.push(LockWrite::Put {
                    key: composite(LOCK_PREFIX, account, &req.lock_id),
                    record: LockRecord {
                        handle,
                        till: unix_now() + req.lock_dur.max(0),
                    },
                });
                acquired = Some((mem, handle));
                response.lock = handle;
            }
        }

        if lock_only {
            self.finish_lock_only(account, req, &lock_writes, &acquired)?;
            return Ok(response);
        }

        let token = match self.flusher.begin_request() {
            Ok(token) => token,
            Err(e) => {
                self.rollback_acquired(&acquired);
                return Err(e);
            }
        };

        let batch_result = {
            let _slot = self.slots.lock(account.as_bytes());
            self.apply_batch_phase(account, req, lock_writes, &mut response)
        };
        let published = match batch_result {
            Ok(published) => published,
            Err(e) => {
                drop(token);
                self.rollback_acquired(&acquired);
                return Err(e);
            }
        };

        // The batch sits in the engine's buffers; hold the request token
        // until the gate we observed is opened by a covering fsync
        self.flusher.wait_durable();
        drop(token);

        if !extend && !req.unlock_id.is_empty() {
            // The staged delete of the lock record is durable, so the
            // unlock may become observable. A failure here means the 30 s
            // grace lapsed during the commit, which already released it.
            if let Err(e) = self
                .locks
                .release(&mem_key(account, &req.unlock_id), req.unlock)
            {
                warn!(account, error = %e, "post-commit unlock failed");
            }
        }

        if !published.is_empty() {
            let notifier = self.notifiers.account(account);
            for (id, version) in &published {
                notifier.publish(id, *version);
            }
        }

        Ok(response)
    }

    // Lock-only requests: each record write carries its own fsync, and
    // the in-memory release happens only after the delete is durable
    fn finish_lock_only(
        &self,
        account: &str,
        req: &Request,
        lock_writes: &[LockWrite],
        acquired: &Option<(Vec<u8>, i64)>,
    ) -> Result<()> {
        for write in lock_writes {
            let result = match write {
                LockWrite::Put { key, record } => record
                    .encode()
                    .and_then(|encoded| self.store.put_sync(key, &encoded)),
                LockWrite::Delete { key } => self.store.delete_sync(key),
            };
            if let Err(e) = result {
                self.rollback_acquired(acquired);
                return Err(e);
            }
        }
        if !req.unlock_id.is_empty() && req.unlock_id != req.lock_id {
            self.locks
                .release(&mem_key(account, &req.unlock_id), req.unlock)?;
        }
        Ok(())
    }

    fn apply_batch_phase(
        &self,
        account: &str,
        req: &Request,
        lock_writes: Vec<LockWrite>,
        response: &mut Response,
    ) -> Result<Vec<(String, i64)>> {
        let mut batch = WriteBatch::new(self.store.as_ref());
        for write in lock_writes {
            match write {
                LockWrite::Put { key, record } => batch.put(key, record.encode()?),
                LockWrite::Delete { key } => batch.delete(key),
            }
        }
        self.check_idempotency(account, req, &mut batch)?;
        self.apply_atomic(account, req, &mut batch, response)?;
        self.apply_gets(account, req, &batch, response)?;
        let published = self.apply_sets(account, req, &mut batch)?;
        self.store.apply(batch.into_ops())?;
        Ok(published)
    }

    // Presence of an unexpired marker rejects the request; the fresh
    // marker is staged either way, so expired ones are swept in place
    fn check_idempotency(
        &self,
        account: &str,
        req: &Request,
        batch: &mut WriteBatch<'_>,
    ) -> Result<()> {
        let now = unix_now();
        for id in &req.idempotency_ids {
            let key = composite(IDEMPOTENCY_PREFIX, account, id);
            if let Some(marker) = batch.get(&key)? {
                match marker_expires_at(&marker) {
                    Some(expires) if expires <= now => {}
                    _ => return Err(Error::Duplicate(id.clone())),
                }
            }
            batch.put(key, idempotency_marker(now + self.idempotency_ttl_s));
        }
        Ok(())
    }

    fn apply_atomic(
        &self,
        account: &str,
        req: &Request,
        batch: &mut WriteBatch<'_>,
        response: &mut Response,
    ) -> Result<()> {
        for op in &req.atomic {
            let key = composite(ATOMIC_PREFIX, account, &op.key);
            let old = batch.get_i64(&key)?.unwrap_or(0);
            let (new, precondition_failed) = match (op.set, op.if_eq) {
                (Some(_), Some(expect)) if old != expect => (old, true),
                (Some(target), _) => (target, false),
                (None, _) => (old.wrapping_add(op.add), false),
            };
            if !precondition_failed {
                batch.put_i64(key, new);
            }
            response.atomic.push(AtomicReply {
                key: op.key.clone(),
                old,
                new,
                precondition_failed,
            });
        }
        Ok(())
    }

    fn apply_gets(
        &self,
        account: &str,
        req: &Request,
        batch: &WriteBatch<'_>,
        response: &mut Response,
    ) -> Result<()> {
        for id in &req.kv_get {
            let key = composite(KV_PREFIX, account, id);
            let reply = match batch.get(&key)? {
                Some(data) => {
                    let record = KvRecord::decode(&data)?;
                    KvReply {
                        key: id.clone(),
                        value: record.data,
                        version: record.version,
                    }
                }
                None => KvReply {
                    key: id.clone(),
                    ..Default::default()
                },
            };
            response.kv_get.push(reply);
        }
        Ok(())
    }

    // Every write, tombstones included, consumes one version from the
    // account's sequence; watchers learn the assigned versions after
    // commit
    fn apply_sets(
        &self,
        account: &str,
        req: &Request,
        batch: &mut WriteBatch<'_>,
    ) -> Result<Vec<(String, i64)>> {
        if req.kv_set.is_empty() {
            return Ok(Vec::new());
        }
        let seq_key = account_key(VERSION_SEQ_PREFIX, account);
        let mut seq = batch.get_i64(&seq_key)?.unwrap_or(0);
        let mut published = Vec::with_capacity(req.kv_set.len());
        for op in &req.kv_set {
            seq += 1;
            let key = composite(KV_PREFIX, account, &op.key);
            if op.delete {
                batch.delete(key);
            } else {
                let record = KvRecord {
                    data: op.value.clone(),
                    version: seq,
                };
                batch.put(key, record.encode()?);
            }
            published.push((op.key.clone(), seq));
        }
        batch.put_i64(seq_key, seq);
        Ok(published)
    }

    fn rollback_acquired(&self, acquired: &Option<(Vec<u8>, i64)>) {
        if let Some((key, handle)) = acquired {
            if let Err(e) = self.locks.release(key, *handle) {
                warn!(handle, error = %e, "failed to roll back acquired lock");
            }
        }
    }
}

fn validate_request(account: &str, req: &Request) -> Result<()> {
    validate_ident(account)?;
    if !req.lock_id.is_empty() {
        validate_ident(&req.lock_id)?;
    }
    if !req.unlock_id.is_empty() {
        validate_ident(&req.unlock_id)?;
    }
    for id in &req.idempotency_ids {
        validate_ident(id)?;
    }
    for op in &req.atomic {
        validate_ident(&op.key)?;
    }
    for op in &req.kv_set {
        validate_ident(&op.key)?;
    }
    for id in &req.kv_get {
        validate_ident(id)?;
    }
    Ok(())
}
