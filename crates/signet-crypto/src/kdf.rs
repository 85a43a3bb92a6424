//! key derivation functions.
//!
//! two KDFs are protocol-fixed:
//! - `KDF_INTERNAL(K, i) = HMAC-SHA-256(K, be64(i))[0..16]` derives the family
//!   of 16-byte subkeys from the shared master secret
//! - KDF_X9.63 with SHA-256 derives envelope keys from ECDH output

use crate::cipher::hmac_sha256;
use crate::Result;

/// subkey indexes fixed by the protocol.
pub mod index {
    /// master secret derived from the raw ECDH output.
    pub const MASTER_SECRET: u64 = 0;
    /// possession factor signature key.
    pub const SIGNATURE_POSSESSION: u64 = 1;
    /// knowledge factor signature key.
    pub const SIGNATURE_KNOWLEDGE: u64 = 2;
    /// biometry factor signature key.
    pub const SIGNATURE_BIOMETRY: u64 = 3;
    /// transport key protecting the vault unlock response.
    pub const TRANSPORT: u64 = 1000;
    /// vault encryption key handed to the client.
    pub const ENCRYPTED_VAULT: u64 = 2000;
}

/// the three 16-byte factor keys derived from one master secret.
#[derive(Clone)]
pub struct SignatureKeys {
    /// possession factor key.
    pub possession: [u8; 16],
    /// knowledge factor key.
    pub knowledge: [u8; 16],
    /// biometry factor key.
    pub biometry: [u8; 16],
}

/// derive a 16-byte subkey: first half of `HMAC-SHA-256(key, be64(index))`.
pub fn kdf_internal(key: &[u8], idx: u64) -> Result<[u8; 16]> {
    let mac = hmac_sha256(key, &idx.to_be_bytes())?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac[..16]);
    Ok(out)
}

/// KDF_X9.63 with SHA-256.
///
/// concatenates `SHA-256(secret ‖ be32(counter) ‖ shared_info)` blocks for
/// counter = 1, 2, ... until `length` bytes are produced.
pub fn kdf_x963(secret: &[u8], shared_info: &[u8], length: usize) -> Vec<u8> {
    use sha2::{Digest, Sha256};

    let mut out = Vec::with_capacity(length);
    let mut counter: u32 = 1;
    while out.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(length);
    out
}

/// derive the master secret from a raw ECDH shared secret.
pub fn derive_master_secret(shared_secret: &[u8]) -> Result<[u8; 16]> {
    kdf_internal(shared_secret, index::MASTER_SECRET)
}

/// derive the three factor signature keys from a master secret.
pub fn derive_signature_keys(master_secret: &[u8; 16]) -> Result<SignatureKeys> {
    Ok(SignatureKeys {
        possession: kdf_internal(master_secret, index::SIGNATURE_POSSESSION)?,
        knowledge: kdf_internal(master_secret, index::SIGNATURE_KNOWLEDGE)?,
        biometry: kdf_internal(master_secret, index::SIGNATURE_BIOMETRY)?,
    })
}

/// derive the transport key from a master secret.
pub fn derive_transport_key(master_secret: &[u8; 16]) -> Result<[u8; 16]> {
    kdf_internal(master_secret, index::TRANSPORT)
}

/// derive the vault encryption key from a master secret.
pub fn derive_vault_key(master_secret: &[u8; 16]) -> Result<[u8; 16]> {
    kdf_internal(master_secret, index::ENCRYPTED_VAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_internal_is_deterministic() {
        let key = [7u8; 32];
        assert_eq!(kdf_internal(&key, 1).unwrap(), kdf_internal(&key, 1).unwrap());
    }

    #[test]
    fn test_kdf_internal_indexes_are_independent() {
        let key = [7u8; 32];
        let derived: Vec<[u8; 16]> = [0u64, 1, 2, 3, 1000, 2000]
            .iter()
            .map(|&i| kdf_internal(&key, i).unwrap())
            .collect();
        for (i, a) in derived.iter().enumerate() {
            for b in derived.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_kdf_internal_matches_manual_hmac() {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let key = b"master secret bytes";
        let idx: u64 = 1000;
        let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
        mac.update(&idx.to_be_bytes());
        let full = mac.finalize().into_bytes();

        assert_eq!(kdf_internal(key, idx).unwrap(), full[..16]);
    }

    #[test]
    fn test_kdf_x963_lengths() {
        let secret = [1u8; 32];
        assert_eq!(kdf_x963(&secret, b"info", 16).len(), 16);
        assert_eq!(kdf_x963(&secret, b"info", 32).len(), 32);
        assert_eq!(kdf_x963(&secret, b"info", 48).len(), 48);
        // longer output extends, it does not repeat
        let k32 = kdf_x963(&secret, b"info", 32);
        let k48 = kdf_x963(&secret, b"info", 48);
        assert_eq!(&k48[..32], &k32[..]);
        assert_ne!(&k48[32..48], &k32[..16]);
    }

    #[test]
    fn test_kdf_x963_shared_info_matters() {
        let secret = [1u8; 32];
        assert_ne!(kdf_x963(&secret, b"a", 32), kdf_x963(&secret, b"b", 32));
    }

    #[test]
    fn test_signature_key_family() {
        let master = derive_master_secret(&[9u8; 32]).unwrap();
        let keys = derive_signature_keys(&master).unwrap();
        assert_ne!(keys.possession, keys.knowledge);
        assert_ne!(keys.knowledge, keys.biometry);
        let transport = derive_transport_key(&master).unwrap();
        let vault = derive_vault_key(&master).unwrap();
        assert_ne!(transport, vault);
        assert_ne!(transport, keys.possession);
    }
}
