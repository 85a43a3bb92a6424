//! cryptographic core for signet.
//!
//! this crate implements the protocol-fixed primitives and constructions:
//! - P-256 key generation, ECDH agreement and ECDSA signatures ([`keys`])
//! - KDF_X9.63 and the indexed KDF_INTERNAL subkey family ([`kdf`])
//! - AES-128-CBC/PKCS#7 and HMAC-SHA-256 helpers ([`cipher`])
//! - the envelope protecting key exchange ([`ecies`], [`activation`])
//! - the symmetric request signature engine ([`signature`])
//! - vault key transport ([`vault`]) and at-rest key protection ([`server_key`])
//!
//! everything here is pure computation over byte slices; persistence and
//! state transitions live in the service layer.

#![warn(missing_docs)]

pub mod activation;
pub mod cipher;
pub mod ecies;
pub mod kdf;
pub mod keys;
pub mod server_key;
pub mod signature;
pub mod vault;

mod error;

pub use error::CryptoError;

/// result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
