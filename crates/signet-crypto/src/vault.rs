//! vault key transport.
//!
//! after a verified signature, the server hands the client its vault
//! encryption key wrapped under the transport key, both derived from the
//! shared master secret: `C = AES-128-CBC(KEY_TRANSPORT, PKCS7(KEY_VAULT))`
//! with a zero IV.

use p256::{PublicKey, SecretKey};

use crate::cipher::{aes128_cbc_decrypt, aes128_cbc_encrypt, ZERO_IV};
use crate::kdf::{derive_master_secret, derive_transport_key, derive_vault_key};
use crate::keys;
use crate::{CryptoError, Result};

/// derive and wrap the vault encryption key for the activation identified by
/// this key pair.
pub fn encrypt_vault_encryption_key(
    server_private: &SecretKey,
    device_public: &PublicKey,
) -> Result<Vec<u8>> {
    let shared = keys::shared_secret(server_private, device_public);
    let master_secret = derive_master_secret(&shared)?;
    let transport_key = derive_transport_key(&master_secret)?;
    let vault_key = derive_vault_key(&master_secret)?;
    aes128_cbc_encrypt(&transport_key, &ZERO_IV, &vault_key)
}

/// client-side unwrap of the vault encryption key. used by tests.
pub fn decrypt_vault_encryption_key(
    device_private: &SecretKey,
    server_public: &PublicKey,
    c_vault_key: &[u8],
) -> Result<[u8; 16]> {
    let shared = keys::shared_secret(device_private, server_public);
    let master_secret = derive_master_secret(&shared)?;
    let transport_key = derive_transport_key(&master_secret)?;
    let plain = aes128_cbc_decrypt(&transport_key, &ZERO_IV, c_vault_key)?;
    if plain.len() != 16 {
        return Err(CryptoError::InvalidLength("vault key"));
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&plain);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_key_roundtrip() {
        let (server_private, server_public) = keys::generate_keypair();
        let (device_private, device_public) = keys::generate_keypair();

        let wrapped = encrypt_vault_encryption_key(&server_private, &device_public).unwrap();
        let unwrapped =
            decrypt_vault_encryption_key(&device_private, &server_public, &wrapped).unwrap();

        // both sides derive the same vault key from the shared master secret
        let shared = keys::shared_secret(&server_private, &device_public);
        let master = derive_master_secret(&shared).unwrap();
        assert_eq!(unwrapped, derive_vault_key(&master).unwrap());
    }

    #[test]
    fn test_vault_key_wrong_device_key_fails() {
        let (server_private, server_public) = keys::generate_keypair();
        let (_, device_public) = keys::generate_keypair();
        let (other_private, _) = keys::generate_keypair();

        let wrapped = encrypt_vault_encryption_key(&server_private, &device_public).unwrap();
        // a different device key cannot unwrap to the same value
        match decrypt_vault_encryption_key(&other_private, &server_public, &wrapped) {
            Err(_) => {}
            Ok(key) => {
                let shared = keys::shared_secret(&server_private, &device_public);
                let master = derive_master_secret(&shared).unwrap();
                assert_ne!(key, derive_vault_key(&master).unwrap());
            }
        }
    }
}
