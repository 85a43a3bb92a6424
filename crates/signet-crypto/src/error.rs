//! crypto error types.

use thiserror::Error;

/// errors that can occur in cryptographic operations.
///
/// variants stay coarse on purpose; callers translate them into the generic
/// client-facing errors without leaking which step failed.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// key bytes could not be parsed as a valid curve point or scalar.
    #[error("invalid key material")]
    InvalidKey,

    /// a MAC comparison failed.
    #[error("mac mismatch")]
    MacMismatch,

    /// ciphertext padding or length was invalid.
    #[error("invalid ciphertext")]
    InvalidCiphertext,

    /// an input had the wrong length.
    #[error("invalid length for {0}")]
    InvalidLength(&'static str),

    /// ECDSA signing or signature parsing failed.
    #[error("signature operation failed")]
    Signature,
}
