//! # cachet-store
//!
//! The storage engine: a content-addressed, hierarchically namespaced
//! message log plus the tenant directory, over a key space
//! `(tenantHash, entrypointHash, conversationId, messageHash) -> bytes`
//! backed by real directories.
//!
//! Everything persisted is ciphertext or public key material.  Writes are
//! append-only and keyed by the BLAKE3 hash of the record itself, so a
//! retried or racing identical write converges on the same file.  The only
//! destructive operations are whole-namespace deletions (entrypoint or
//! tenant removal).

pub mod conversations;
pub mod models;
pub mod tenants;

mod error;
mod layout;
mod store;

pub use conversations::Namespace;
pub use error::StoreError;
pub use models::*;
pub use store::Store;
