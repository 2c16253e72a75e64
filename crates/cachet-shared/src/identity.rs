//! Deterministic identity derivation.
//!
//! Cachet has no server-side account table: a keypair is re-derived from
//! the human credentials every time. The same (name, passphrase, tenant,
//! entrypoint) tuple always reproduces the same X25519 keypair, so the
//! public key *is* the account. Nothing derived here is ever transmitted
//! except the public key.

use serde::Serialize;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::constants::KDF_CONTEXT_IDENTITY;
use crate::error::IdentityError;

/// An X25519 keypair derived from human credentials.
#[derive(Clone)]
pub struct Identity {
    secret: StaticSecret,
    public: PublicKey,
}

#[derive(Serialize)]
struct Seed<'a> {
    name: String,
    pw: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entrypoint: Option<String>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Derive the keypair for a visitor or tenant-admin.
///
/// `name`, `tenant` and `entrypoint` are normalized (trim + lowercase);
/// the passphrase is used verbatim. `tenant`/`entrypoint` are omitted in
/// single-entrypoint deployments.
pub fn derive_identity(
    name: &str,
    passphrase: &str,
    tenant: Option<&str>,
    entrypoint: Option<&str>,
) -> Result<Identity, IdentityError> {
    let seed = Seed {
        name: normalize(name),
        pw: passphrase,
        tenant: tenant.map(normalize),
        entrypoint: entrypoint.map(normalize),
    };

    let serialized = serde_json::to_vec(&seed)
        .map_err(|e| IdentityError::SeedSerialization(e.to_string()))?;

    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_IDENTITY);
    hasher.update(&serialized);
    let secret = StaticSecret::from(*hasher.finalize().as_bytes());
    let public = PublicKey::from(&secret);

    Ok(Identity { secret, public })
}

impl Identity {
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }
}
