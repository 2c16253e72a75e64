/// X25519 public/secret key size in bytes
pub const KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// BLAKE3 digest size in bytes
pub const DIGEST_SIZE: usize = 32;

/// Bearer token size in bytes (hex-encoded on the wire)
pub const TOKEN_SIZE: usize = 32;

/// Ciphertext length (hex chars) above which list/summary reads replace the
/// payload with a byte-length placeholder
pub const MESSAGE_SIZE_THRESHOLD: usize = 5000;

/// Prefix marking an elided oversized payload, followed by the original length
pub const LARGE_MESSAGE_MARKER: char = '#';

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_IDENTITY: &str = "cachet-identity-seed-v1";
pub const KDF_CONTEXT_BOX: &str = "cachet-box-key-v1";
pub const KDF_CONTEXT_SEAL: &str = "cachet-seal-key-v1";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
