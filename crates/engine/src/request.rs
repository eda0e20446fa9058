//! Wire types for the mixed-request and watch endpoints
//!
//! Field names are the wire contract; the Rust names follow local
//! convention and serde renames bridge the two. Every request field has a
//! default so clients send only the operations they need. Opaque values
//! travel as base64 strings inside JSON.

use serde::{Deserialize, Serialize};

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// One atomic-counter operation
///
/// `Set` present selects an unconditional write, or a conditional one
/// when `IfEq` is also present; otherwise `Add` increments (the missing
/// counter reads as zero).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomicOp {
    /// Counter id within the account
    #[serde(rename = "Key")]
    pub key: String,
    /// Increment applied when `Set` is absent
    #[serde(rename = "Add")]
    pub add: i64,
    /// Target value for a set
    #[serde(rename = "Set", skip_serializing_if = "Option::is_none")]
    pub set: Option<i64>,
    /// Precondition: only set when the current value equals this
    #[serde(rename = "IfEq", skip_serializing_if = "Option::is_none")]
    pub if_eq: Option<i64>,
}

/// One KV write: a value set or a tombstone delete
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSetOp {
    /// KV id within the account
    #[serde(rename = "Key")]
    pub key: String,
    /// Opaque value bytes (base64 on the wire)
    #[serde(rename = "Value", with = "base64_bytes")]
    pub value: Vec<u8>,
    /// Remove the record instead of writing it
    #[serde(rename = "Delete")]
    pub delete: bool,
}

/// A mixed request: at most one lock operation plus any number of
/// idempotency checks, counter updates, KV reads, and KV writes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    /// Seconds to wait for a contended lock; 0 fails immediately
    #[serde(rename = "LockWait")]
    pub lock_wait: i64,
    /// Seconds the acquired or extended lock stays valid
    #[serde(rename = "LockDur")]
    pub lock_dur: i64,
    /// Lock to acquire; equal to `UnlockID` means extend
    #[serde(rename = "LockID")]
    pub lock_id: String,
    /// Lock to release after this request's writes are durable
    #[serde(rename = "UnlockID")]
    pub unlock_id: String,
    /// Handle owning `UnlockID`; 0 skips the ownership check
    #[serde(rename = "Unlock")]
    pub unlock: i64,
    /// Request ids that must not have been seen before
    #[serde(rename = "IdempotencyIDs")]
    pub idempotency_ids: Vec<String>,
    /// Counter operations, applied in order
    #[serde(rename = "Atomic")]
    pub atomic: Vec<AtomicOp>,
    /// KV writes, versioned in order
    #[serde(rename = "KVSet")]
    pub kv_set: Vec<KvSetOp>,
    /// KV ids to read
    #[serde(rename = "KVGet")]
    pub kv_get: Vec<String>,
}

impl Request {
    /// Whether the request carries anything beyond lock traffic
    pub fn has_data_ops(&self) -> bool {
        !self.idempotency_ids.is_empty()
            || !self.atomic.is_empty()
            || !self.kv_set.is_empty()
            || !self.kv_get.is_empty()
    }

    /// Lock-only requests bypass the batch and write their lock record
    /// with an immediate fsync
    pub fn is_lock_only(&self) -> bool {
        !self.has_data_ops() && (!self.lock_id.is_empty() || !self.unlock_id.is_empty())
    }
}

/// Result of one counter operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomicReply {
    /// Counter id
    #[serde(rename = "Key")]
    pub key: String,
    /// Value before the operation (missing counter reads as 0)
    #[serde(rename = "Old")]
    pub old: i64,
    /// Value after the operation; equals `Old` when the precondition failed
    #[serde(rename = "New")]
    pub new: i64,
    /// `IfEq` did not match; the counter is unchanged
    #[serde(rename = "PreconditionFailed")]
    pub precondition_failed: bool,
}

/// One KV read result; an absent key reads as version 0 with no bytes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KvReply {
    /// KV id
    #[serde(rename = "Key")]
    pub key: String,
    /// Stored value bytes (base64 on the wire)
    #[serde(rename = "Value", with = "base64_bytes")]
    pub value: Vec<u8>,
    /// Stored version; 0 when the key is absent
    #[serde(rename = "Version")]
    pub version: i64,
}

/// Result of a mixed request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    /// Handle of the lock acquired or extended by this request, else 0
    #[serde(rename = "Lock")]
    pub lock: i64,
    /// One reply per `KVGet` entry, in request order
    #[serde(rename = "KVGet")]
    pub kv_get: Vec<KvReply>,
    /// One reply per `Atomic` entry, in request order
    #[serde(rename = "Atomic")]
    pub atomic: Vec<AtomicReply>,
}

/// Body of a watch call: long-poll until `ID`'s version moves past
/// `Version`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchRequest {
    /// KV id to watch
    #[serde(rename = "ID")]
    pub id: String,
    /// Version the caller already has; 0 for "any existing value"
    #[serde(rename = "Version")]
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_request_parses_with_defaults() {
        let req: Request = serde_json::from_str(r#"{"KVGet": ["k"]}"#).unwrap();
        assert_eq!(req.kv_get, vec!["k".to_string()]);
        assert_eq!(req.lock_wait, 0);
        assert!(req.lock_id.is_empty());
        assert!(req.atomic.is_empty());
        assert!(!req.is_lock_only());
    }

    #[test]
    fn test_wire_field_names() {
        let req = Request {
            lock_id: "leader".to_string(),
            lock_dur: 10,
            ..Default::default()
        };
        let body = serde_json::to_string(&req).unwrap();
        assert!(body.contains("\"LockID\":\"leader\""));
        assert!(body.contains("\"LockDur\":10"));
        assert!(body.contains("\"IdempotencyIDs\""));
    }

    #[test]
    fn test_value_bytes_travel_as_base64() {
        let op = KvSetOp {
            key: "k".to_string(),
            value: b"hello".to_vec(),
            delete: false,
        };
        let body = serde_json::to_string(&op).unwrap();
        assert!(body.contains("aGVsbG8="));
        let parsed: KvSetOp = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.value, b"hello");
    }

    #[test]
    fn test_atomic_set_distinguished_from_add() {
        let add: AtomicOp = serde_json::from_str(r#"{"Key":"c","Add":1}"#).unwrap();
        assert_eq!(add.set, None);
        assert_eq!(add.add, 1);

        let set: AtomicOp = serde_json::from_str(r#"{"Key":"c","Set":10,"IfEq":5}"#).unwrap();
        assert_eq!(set.set, Some(10));
        assert_eq!(set.if_eq, Some(5));
    }

    #[test]
    fn test_lock_only_classification() {
        let lock: Request = serde_json::from_str(r#"{"LockID":"l","LockDur":30}"#).unwrap();
        assert!(lock.is_lock_only());

        let mixed: Request =
            serde_json::from_str(r#"{"LockID":"l","LockDur":30,"KVGet":["k"]}"#).unwrap();
        assert!(!mixed.is_lock_only());

        let empty = Request::default();
        assert!(!empty.is_lock_only());
    }
}
