//! # cachet-shared
//!
//! Crypto primitives and wire types shared by the Cachet server, the
//! storage engine and the provisioning tool.
//!
//! Everything that crosses the wire or hits the disk is either a lowercase
//! hex string (keys, nonces, digests, ciphertext) or the JSON message
//! record defined in [`protocol`].  The server never handles plaintext
//! message contents; these primitives exist so that clients and the setup
//! flow can agree on one set of contracts.

pub mod constants;
pub mod crypto;
pub mod identity;
pub mod protocol;

mod error;

pub use error::{CryptoError, IdentityError};
