//! Composite key construction and id validation
//!
//! Every stored record lives under a one-byte namespace prefix followed by
//! the account and (for most namespaces) the id, NUL-delimited:
//!
//! ```text
//! <prefix> <account> 0x00 <id>      counters, locks, idempotency, KV
//! <prefix> <account>                per-account version sequence
//! ```
//!
//! The prefix values are stable on-disk; changing them orphans existing
//! databases. Accounts and ids are 1-255 bytes and may not contain NUL,
//! which keeps the composite encoding unambiguous and prefix scans cheap.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use fnv::FnvHasher;
use std::hash::Hasher;

/// Namespace prefix for atomic counters
pub const ATOMIC_PREFIX: u8 = 0x01;
/// Namespace prefix for per-account KV version sequences
pub const VERSION_SEQ_PREFIX: u8 = 0x03;
/// Namespace prefix for persistent lock records
pub const LOCK_PREFIX: u8 = 0x04;
/// Namespace prefix for idempotency markers
pub const IDEMPOTENCY_PREFIX: u8 = 0x05;
/// Namespace prefix for versioned KV entries
pub const KV_PREFIX: u8 = 0x06;

/// Build a `<prefix> <account> 0x00 <id>` composite key
pub fn composite(prefix: u8, account: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(account.len() + id.len() + 2);
    key.push(prefix);
    key.extend_from_slice(account.as_bytes());
    key.push(0);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build a `<prefix> <account>` key (version sequence)
pub fn account_key(prefix: u8, account: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(account.len() + 1);
    key.push(prefix);
    key.extend_from_slice(account.as_bytes());
    key
}

/// Build the in-memory lock key `<account> 0x00 <id>`
pub fn mem_key(account: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(account.len() + id.len() + 1);
    key.extend_from_slice(account.as_bytes());
    key.push(0);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Recover the in-memory lock key from a stored lock key (strip the prefix)
pub fn mem_key_from_disk(disk_key: &[u8]) -> &[u8] {
    &disk_key[1..]
}

/// Encode a signed 64-bit integer as 8 little-endian bytes
pub fn encode_i64(value: i64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_i64(&mut buf, value);
    buf
}

/// Decode 8 little-endian bytes into a signed 64-bit integer
pub fn decode_i64(data: &[u8]) -> Result<i64> {
    if data.len() != 8 {
        return Err(Error::codec(format!(
            "int64 record is {} bytes, want 8",
            data.len()
        )));
    }
    Ok(LittleEndian::read_i64(data))
}

/// 64-bit FNV-1a hash used for shard selection in the keyed banks
pub fn shard_hash(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Validate a client-supplied account or id: 1-255 bytes, no NUL
pub fn validate_ident(ident: &str) -> Result<()> {
    let len = ident.len();
    if len == 0 || len > 255 {
        return Err(Error::validation("len is not in range 1~255"));
    }
    if ident.bytes().any(|b| b == 0) {
        return Err(Error::validation("0 byte is not allowed in identifiers"));
    }
    Ok(())
}
