//! The message record exchanged with clients and persisted on disk.
//!
//! Field names are deliberately terse: the record is stored verbatim and
//! the server learns nothing from it beyond routing metadata.
//!
//! - `k` — conversation key (visitor public key, or a tenant public key
//!   for the inter-tenant channel), hex
//! - `n` — nonce used by the client for the box encryption, hex
//! - `m` — ciphertext, hex (or a `#<len>` placeholder after elision)
//! - `f` — optional sealed sender descriptor, hex
//! - `t` — receipt timestamp in milliseconds, assigned by the server

use serde::{Deserialize, Serialize};

use crate::constants::{LARGE_MESSAGE_MARKER, MESSAGE_SIZE_THRESHOLD};

/// A message as submitted by a client, before the server stamps it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftMessage {
    pub k: String,
    pub n: String,
    pub m: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
}

/// A stamped message: the exact on-disk record and API response shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    pub k: String,
    pub n: String,
    pub m: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
    pub t: i64,
}

impl DraftMessage {
    /// Stamp the server receipt time, producing the record to persist.
    pub fn stamp(self, t: i64) -> StoredMessage {
        StoredMessage {
            k: self.k,
            n: self.n,
            m: self.m,
            f: self.f,
            t,
        }
    }
}

impl StoredMessage {
    /// The serialized form that is both hashed and written to disk.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Content address: BLAKE3 of the canonical bytes, hex. Identical
    /// logical messages always share a storage key.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        Ok(crate::crypto::hash_hex(&self.canonical_bytes()?))
    }

    pub fn is_elided(&self) -> bool {
        self.m.starts_with(LARGE_MESSAGE_MARKER)
    }
}

/// Replace an oversized ciphertext with a byte-length placeholder.
///
/// Applied on list/summary read paths only; the stored record is never
/// modified, and the by-nonce lookup always returns the full payload.
pub fn apply_size_threshold(mut msg: StoredMessage) -> StoredMessage {
    if msg.m.len() > MESSAGE_SIZE_THRESHOLD {
        msg.m = format!("{}{}", LARGE_MESSAGE_MARKER, msg.m.len());
    }
    msg
}

/// The single newest message of a conversation. `None` on an empty list.
pub fn latest_message(messages: &[StoredMessage]) -> Option<&StoredMessage> {
    messages.iter().max_by_key(|msg| msg.t)
}
