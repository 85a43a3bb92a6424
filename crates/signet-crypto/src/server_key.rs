//! at-rest protection for per-activation server private keys.
//!
//! in `AES_HMAC` mode the stored value is `iv ‖ ciphertext ‖ hmac`. the AES
//! and MAC keys are derived from the server-wide master key and the record
//! identity `(user_id, activation_id)`, so a leaked blob is useless without
//! the master key and cannot be replayed onto another record.

use crate::cipher::{aes128_cbc_decrypt, aes128_cbc_encrypt, ct_eq, hmac_sha256, BLOCK_LEN};
use crate::kdf::kdf_x963;
use crate::{CryptoError, Result};

const MAC_LEN: usize = 32;

/// derive the (AES, MAC) key pair for one record.
fn derive_record_keys(
    master_db_key: &[u8],
    user_id: &str,
    activation_id: &str,
) -> ([u8; 16], [u8; 16]) {
    let identity = format!("{}&{}", user_id, activation_id);
    let derived = kdf_x963(master_db_key, identity.as_bytes(), 32);
    let mut enc_key = [0u8; 16];
    let mut mac_key = [0u8; 16];
    enc_key.copy_from_slice(&derived[..16]);
    mac_key.copy_from_slice(&derived[16..32]);
    (enc_key, mac_key)
}

/// encrypt a server private key for storage. returns the raw blob.
pub fn encrypt_server_private_key(
    master_db_key: &[u8],
    user_id: &str,
    activation_id: &str,
    private_key: &[u8],
) -> Result<Vec<u8>> {
    use rand::RngCore;

    let (enc_key, mac_key) = derive_record_keys(master_db_key, user_id, activation_id);
    let mut iv = [0u8; BLOCK_LEN];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = aes128_cbc_encrypt(&enc_key, &iv, private_key)?;
    let mut blob = Vec::with_capacity(BLOCK_LEN + ciphertext.len() + MAC_LEN);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    let mac = hmac_sha256(&mac_key, &blob)?;
    blob.extend_from_slice(&mac);
    Ok(blob)
}

/// verify and decrypt a stored server private key blob.
pub fn decrypt_server_private_key(
    master_db_key: &[u8],
    user_id: &str,
    activation_id: &str,
    blob: &[u8],
) -> Result<Vec<u8>> {
    if blob.len() < BLOCK_LEN + BLOCK_LEN + MAC_LEN {
        return Err(CryptoError::InvalidLength("server private key blob"));
    }
    let (enc_key, mac_key) = derive_record_keys(master_db_key, user_id, activation_id);

    let mac_offset = blob.len() - MAC_LEN;
    let (body, mac) = blob.split_at(mac_offset);
    let expected = hmac_sha256(&mac_key, body)?;
    if !ct_eq(&expected, mac) {
        return Err(CryptoError::MacMismatch);
    }

    let (iv, ciphertext) = body.split_at(BLOCK_LEN);
    aes128_cbc_decrypt(&enc_key, iv, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: [u8; 16] = [0x42; 16];

    #[test]
    fn test_roundtrip() {
        let private_key = [7u8; 32];
        let blob =
            encrypt_server_private_key(&MASTER, "user-1", "act-1", &private_key).unwrap();
        let decrypted =
            decrypt_server_private_key(&MASTER, "user-1", "act-1", &blob).unwrap();
        assert_eq!(decrypted, private_key);
    }

    #[test]
    fn test_blob_is_bound_to_record_identity() {
        let private_key = [7u8; 32];
        let blob =
            encrypt_server_private_key(&MASTER, "user-1", "act-1", &private_key).unwrap();
        // moving the blob to another record fails the mac
        assert!(matches!(
            decrypt_server_private_key(&MASTER, "user-2", "act-1", &blob),
            Err(CryptoError::MacMismatch)
        ));
        assert!(matches!(
            decrypt_server_private_key(&MASTER, "user-1", "act-2", &blob),
            Err(CryptoError::MacMismatch)
        ));
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let blob = encrypt_server_private_key(&MASTER, "u", "a", &[1u8; 32]).unwrap();
        for index in [0, 16, blob.len() - 1] {
            let mut tampered = blob.clone();
            tampered[index] ^= 0x01;
            assert!(decrypt_server_private_key(&MASTER, "u", "a", &tampered).is_err());
        }
    }

    #[test]
    fn test_wrong_master_key_rejected() {
        let blob = encrypt_server_private_key(&MASTER, "u", "a", &[1u8; 32]).unwrap();
        assert!(matches!(
            decrypt_server_private_key(&[0x43; 16], "u", "a", &blob),
            Err(CryptoError::MacMismatch)
        ));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        assert!(matches!(
            decrypt_server_private_key(&MASTER, "u", "a", &[0u8; 10]),
            Err(CryptoError::InvalidLength(_))
        ));
    }
}
