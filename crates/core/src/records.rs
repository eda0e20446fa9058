//! Stored record layouts
//!
//! Lock and KV records are msgpack maps with single-letter field names;
//! counters and version sequences are raw 8-byte little-endian integers
//! (see [`crate::keys`]); idempotency markers hold their own expiry.

use crate::error::{Error, Result};
use crate::keys::{decode_i64, encode_i64};
use serde::{Deserialize, Serialize};

/// Persistent lock record: `{o: handle, t: till}`
///
/// Written when a lock is acquired or extended, deleted on unlock. `till`
/// is unix seconds; restart recovery reinstalls records with `till` in the
/// future and drops the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Owning handle; required to extend or release
    #[serde(rename = "o")]
    pub handle: i64,
    /// Unix-seconds expiry
    #[serde(rename = "t")]
    pub till: i64,
}

impl LockRecord {
    /// Encode as a named msgpack map
    pub fn encode(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::codec(e.to_string()))
    }

    /// Decode from a named msgpack map
    pub fn decode(data: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(data).map_err(|e| Error::codec(e.to_string()))
    }
}

/// Versioned KV entry: `{d: data, v: version}`
///
/// The version is assigned from the account's sequence; it strictly
/// increases across every write to the account's KV namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRecord {
    /// Opaque client value
    #[serde(rename = "d", with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Version assigned at write time
    #[serde(rename = "v")]
    pub version: i64,
}

impl KvRecord {
    /// Encode as a named msgpack map
    pub fn encode(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::codec(e.to_string()))
    }

    /// Decode from a named msgpack map
    pub fn decode(data: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(data).map_err(|e| Error::codec(e.to_string()))
    }
}

/// Encode an idempotency marker carrying its unix-seconds expiry
pub fn idempotency_marker(expires_at: i64) -> Vec<u8> {
    encode_i64(expires_at).to_vec()
}

/// Expiry of a stored idempotency marker
///
/// Markers written by older builds may hold arbitrary bytes; those are
/// treated as never expiring so a duplicate is still rejected.
pub fn marker_expires_at(data: &[u8]) -> Option<i64> {
    decode_i64(data).ok()
}
