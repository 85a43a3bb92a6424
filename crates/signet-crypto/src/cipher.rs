//! symmetric building blocks: AES-128-CBC with PKCS#7 and HMAC-SHA-256.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{CryptoError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block size; also the IV length.
pub const BLOCK_LEN: usize = 16;

/// all-zero IV used where the protocol fixes it.
pub const ZERO_IV: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];

/// AES-128-CBC encrypt with PKCS#7 padding.
pub fn aes128_cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidLength("aes key or iv"))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// AES-128-CBC decrypt with PKCS#7 padding.
pub fn aes128_cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidLength("aes key or iv"))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertext)
}

/// HMAC-SHA-256 over `data`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).map_err(|_| CryptoError::InvalidLength("hmac key"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// constant-time byte comparison.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_cbc_roundtrip() {
        let key = [3u8; 16];
        let iv = [5u8; 16];
        for len in [0usize, 1, 15, 16, 17, 100] {
            let plaintext = vec![0xabu8; len];
            let ciphertext = aes128_cbc_encrypt(&key, &iv, &plaintext).unwrap();
            // pkcs7 always pads to the next full block
            assert_eq!(ciphertext.len(), (len / BLOCK_LEN + 1) * BLOCK_LEN);
            let decrypted = aes128_cbc_decrypt(&key, &iv, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_aes_cbc_wrong_key_fails_or_garbles() {
        let iv = [0u8; 16];
        let ciphertext = aes128_cbc_encrypt(&[1u8; 16], &iv, b"sixteen byte msg").unwrap();
        match aes128_cbc_decrypt(&[2u8; 16], &iv, &ciphertext) {
            Err(_) => {}
            Ok(decrypted) => assert_ne!(decrypted, b"sixteen byte msg"),
        }
    }

    #[test]
    fn test_aes_rejects_bad_key_length() {
        assert!(aes128_cbc_encrypt(&[0u8; 7], &ZERO_IV, b"data").is_err());
        assert!(aes128_cbc_encrypt(&[0u8; 16], &[0u8; 3], b"data").is_err());
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"abcd"));
        assert!(ct_eq(b"", b""));
    }
}
