//! Crypto primitives for the Cachet protocol.
//!
//! Two public-key constructions over X25519 + XChaCha20-Poly1305:
//!
//! - **box**: authenticated encryption between two known keypairs, with a
//!   caller-supplied 24-byte nonce (the nonce travels in the message record).
//! - **seal**: anonymous sealed encryption; a fresh ephemeral keypair is
//!   generated per blob, so only the recipient's keypair can open it and the
//!   sender is not recoverable from the ciphertext.
//!
//! Sealed wire format: `epk (32) || nonce (24) || ciphertext + tag`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};

use crate::constants::{
    DIGEST_SIZE, KDF_CONTEXT_BOX, KDF_CONTEXT_SEAL, KEY_SIZE, NONCE_SIZE, TOKEN_SIZE,
};
use crate::error::CryptoError;

/// BLAKE3 digest of arbitrary bytes.
pub fn hash(data: &[u8]) -> [u8; DIGEST_SIZE] {
    *blake3::hash(data).as_bytes()
}

/// Hex digest of arbitrary bytes.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Hash of a human-chosen label (tenant name, entrypoint label).
///
/// The single normalization point: trims whitespace and lowercases before
/// hashing, so the same label always maps to the same identifier.
pub fn hash_id(label: &str) -> String {
    hash_hex(label.trim().to_lowercase().as_bytes())
}

/// Fresh 32-byte bearer token, hex-encoded.
pub fn random_token() -> String {
    let mut token = [0u8; TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);
    hex::encode(token)
}

pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Parse a 64-char lowercase hex string into an X25519 public key.
pub fn parse_public_key_hex(hex_key: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(hex_key.trim())?;
    let arr: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength)?;
    Ok(PublicKey::from(arr))
}

fn derive_box_key(shared: &SharedSecret) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_BOX);
    hasher.update(shared.as_bytes());
    *hasher.finalize().as_bytes()
}

fn derive_seal_key(shared: &SharedSecret, epk: &PublicKey, rpk: &PublicKey) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_SEAL);
    hasher.update(shared.as_bytes());
    hasher.update(epk.as_bytes());
    hasher.update(rpk.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Authenticated encryption between two keypairs with an explicit nonce.
pub fn box_encrypt(
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    own_secret: &StaticSecret,
    peer_public: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    let shared = own_secret.diffie_hellman(peer_public);
    let cipher = XChaCha20Poly1305::new(&derive_box_key(&shared).into());

    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

/// Open an authenticated box. Fails if the ciphertext was not produced by
/// the matching keypair or has been tampered with.
pub fn box_open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    own_secret: &StaticSecret,
    peer_public: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    let shared = own_secret.diffie_hellman(peer_public);
    let cipher = XChaCha20Poly1305::new(&derive_box_key(&shared).into());

    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Anonymous sealed encryption to a recipient public key.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let epk = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);

    let cipher = XChaCha20Poly1305::new(&derive_seal_key(&shared, &epk, recipient).into());
    let nonce = random_nonce();

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(KEY_SIZE + NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(epk.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed blob with the recipient's keypair.
pub fn seal_open(
    blob: &[u8],
    recipient_public: &PublicKey,
    recipient_secret: &StaticSecret,
) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < KEY_SIZE + NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (epk_bytes, rest) = blob.split_at(KEY_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let epk_arr: [u8; KEY_SIZE] = epk_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength)?;
    let epk = PublicKey::from(epk_arr);
    let shared = recipient_secret.diffie_hellman(&epk);

    let cipher =
        XChaCha20Poly1305::new(&derive_seal_key(&shared, &epk, recipient_public).into());

    cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (StaticSecret, PublicKey) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        (secret, public)
    }

    #[test]
    fn test_hash_id_normalizes() {
        assert_eq!(hash_id("Acme Corp"), hash_id("  acme corp  "));
        assert_ne!(hash_id("acme"), hash_id("acme corp"));
    }

    #[test]
    fn test_box_roundtrip() {
        let (alice_sec, alice_pub) = keypair();
        let (bob_sec, bob_pub) = keypair();
        let nonce = random_nonce();

        let ct = box_encrypt(b"bonjour", &nonce, &alice_sec, &bob_pub).unwrap();
        let pt = box_open(&ct, &nonce, &bob_sec, &alice_pub).unwrap();
        assert_eq!(pt, b"bonjour");
    }

    #[test]
    fn test_box_wrong_peer_fails() {
        let (alice_sec, _) = keypair();
        let (bob_sec, bob_pub) = keypair();
        let (_, eve_pub) = keypair();
        let nonce = random_nonce();

        let ct = box_encrypt(b"secret", &nonce, &alice_sec, &bob_pub).unwrap();
        assert!(box_open(&ct, &nonce, &bob_sec, &eve_pub).is_err());
    }

    #[test]
    fn test_seal_roundtrip() {
        let (sec, public) = keypair();

        let blob = seal(b"for your eyes only", &public).unwrap();
        let pt = seal_open(&blob, &public, &sec).unwrap();
        assert_eq!(pt, b"for your eyes only");
    }

    #[test]
    fn test_seal_wrong_recipient_fails() {
        let (_, public) = keypair();
        let (other_sec, other_pub) = keypair();

        let blob = seal(b"misdelivered", &public).unwrap();
        assert!(seal_open(&blob, &other_pub, &other_sec).is_err());
    }

    #[test]
    fn test_seal_tampered_fails() {
        let (sec, public) = keypair();

        let mut blob = seal(b"integrity", &public).unwrap();
        let len = blob.len();
        blob[len - 1] ^= 0xFF;

        assert!(seal_open(&blob, &public, &sec).is_err());
    }

    #[test]
    fn test_seal_truncated_fails() {
        let (sec, public) = keypair();
        assert!(seal_open(&[0u8; 10], &public, &sec).is_err());
    }

    #[test]
    fn test_random_tokens_distinct() {
        assert_ne!(random_token(), random_token());
    }
}
