//! P-256 key handling: generation, encoding, ECDH and ECDSA.
//!
//! public keys travel as uncompressed SEC1 points (65 bytes), private keys as
//! the raw 32-byte scalar. ECDSA signatures use DER encoding.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;

use crate::{CryptoError, Result};

/// length of an uncompressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 65;

/// length of a raw private key scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// generate a fresh P-256 keypair.
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    (secret, public)
}

/// encode a public key as an uncompressed SEC1 point.
pub fn public_key_to_bytes(key: &PublicKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

/// parse an uncompressed SEC1 point.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidKey)
}

/// encode a private key as the raw scalar.
pub fn private_key_to_bytes(key: &SecretKey) -> Vec<u8> {
    key.to_bytes().to_vec()
}

/// parse a raw private key scalar.
pub fn private_key_from_bytes(bytes: &[u8]) -> Result<SecretKey> {
    SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidKey)
}

/// ECDH agreement. returns the raw 32-byte x-coordinate shared secret.
pub fn shared_secret(private: &SecretKey, public: &PublicKey) -> [u8; 32] {
    let shared = p256::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes());
    out
}

/// sign `data` with ECDSA/SHA-256, returning the DER-encoded signature.
pub fn ecdsa_sign_der(private: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::from(private);
    let signature: Signature = signing_key
        .try_sign(data)
        .map_err(|_| CryptoError::Signature)?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// verify a DER-encoded ECDSA/SHA-256 signature.
pub fn ecdsa_verify_der(public: &PublicKey, data: &[u8], signature_der: &[u8]) -> bool {
    let Ok(signature) = Signature::from_der(signature_der) else {
        return false;
    };
    let verifying_key = VerifyingKey::from(public);
    verifying_key.verify(data, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_roundtrip() {
        let (_, public) = generate_keypair();
        let bytes = public_key_to_bytes(&public);
        assert_eq!(bytes.len(), PUBLIC_KEY_LEN);
        assert_eq!(bytes[0], 0x04);
        let parsed = public_key_from_bytes(&bytes).unwrap();
        assert_eq!(public, parsed);
    }

    #[test]
    fn test_private_key_roundtrip() {
        let (secret, public) = generate_keypair();
        let bytes = private_key_to_bytes(&secret);
        assert_eq!(bytes.len(), PRIVATE_KEY_LEN);
        let parsed = private_key_from_bytes(&bytes).unwrap();
        assert_eq!(parsed.public_key(), public);
    }

    #[test]
    fn test_invalid_public_key_rejected() {
        assert!(public_key_from_bytes(&[0u8; 65]).is_err());
        assert!(public_key_from_bytes(b"short").is_err());
    }

    #[test]
    fn test_ecdh_is_symmetric() {
        let (a_priv, a_pub) = generate_keypair();
        let (b_priv, b_pub) = generate_keypair();
        assert_eq!(shared_secret(&a_priv, &b_pub), shared_secret(&b_priv, &a_pub));
    }

    #[test]
    fn test_ecdsa_sign_verify() {
        let (secret, public) = generate_keypair();
        let signature = ecdsa_sign_der(&secret, b"approval data").unwrap();
        assert!(ecdsa_verify_der(&public, b"approval data", &signature));
        assert!(!ecdsa_verify_der(&public, b"other data", &signature));
    }

    #[test]
    fn test_ecdsa_verify_rejects_garbage() {
        let (_, public) = generate_keypair();
        assert!(!ecdsa_verify_der(&public, b"data", b"not a der signature"));
        assert!(!ecdsa_verify_der(&public, b"data", &[]));
    }
}
