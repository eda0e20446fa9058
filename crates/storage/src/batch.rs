//! Read-through write batch
//!
//! All mutations of an account's records happen as read-modify-write under
//! that account's update slot. The batch stages every mutation in memory
//! and answers reads from the staged set first, so a request that bumps a
//! counter twice sees its own first bump. `into_ops` hands the staged
//! mutations to [`Store::apply`] as one atomic engine batch.

use latch_core::error::Result;
use latch_core::keys::{decode_i64, encode_i64};
use latch_core::store::{BatchOp, Store};
use std::collections::BTreeMap;

/// Staged mutations over a live store, with read-your-writes
pub struct WriteBatch<'a> {
    store: &'a dyn Store,
    // key → Some(value) for a staged put, None for a staged delete
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> WriteBatch<'a> {
    /// Start an empty batch over `store`
    pub fn new(store: &'a dyn Store) -> Self {
        WriteBatch {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// Read through the staged set, falling back to the store
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        self.store.get(key)
    }

    /// Stage a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key, Some(value));
    }

    /// Stage a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.staged.insert(key, None);
    }

    /// Read an 8-byte LE integer record; absent key reads as `None`
    pub fn get_i64(&self, key: &[u8]) -> Result<Option<i64>> {
        match self.get(key)? {
            Some(data) => Ok(Some(decode_i64(&data)?)),
            None => Ok(None),
        }
    }

    /// Stage an 8-byte LE integer record
    pub fn put_i64(&mut self, key: Vec<u8>, value: i64) {
        self.put(key, encode_i64(value).to_vec());
    }

    /// Number of staged mutations
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether anything has been staged
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Drain the staged mutations into engine batch ops
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.staged
            .into_iter()
            .map(|(key, staged)| match staged {
                Some(value) => BatchOp::Put { key, value },
                None => BatchOp::Delete { key },
            })
            .collect()
    }
}
