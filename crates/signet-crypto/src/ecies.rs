//! the envelope protecting key exchange payloads.
//!
//! an ECIES-like construction over P-256: the sender generates an ephemeral
//! keypair, agrees on a shared secret with the recipient's static key, and
//! derives an AES key and a MAC key via KDF_X9.63 keyed on the ephemeral
//! public point. the payload is AES-128-CBC encrypted with a zero IV and
//! authenticated with HMAC-SHA-256 over `ciphertext ‖ shared_info`.
//!
//! the response to a decrypted request reuses the derived keys, so only the
//! request direction carries an ephemeral key.

use p256::{PublicKey, SecretKey};

use crate::cipher::{aes128_cbc_decrypt, aes128_cbc_encrypt, ct_eq, hmac_sha256, ZERO_IV};
use crate::kdf::kdf_x963;
use crate::keys;
use crate::{CryptoError, Result};

/// a sealed envelope: ephemeral key, ciphertext and MAC.
#[derive(Debug, Clone)]
pub struct EciesEnvelope {
    /// sender's ephemeral public key, uncompressed SEC1.
    pub ephemeral_public_key: Vec<u8>,
    /// AES-128-CBC ciphertext.
    pub encrypted_data: Vec<u8>,
    /// HMAC-SHA-256 over `encrypted_data ‖ shared_info`.
    pub mac: Vec<u8>,
}

/// keys derived from one ECDH agreement, usable for a request/response pair.
struct EnvelopeKeys {
    enc_key: [u8; 16],
    mac_key: [u8; 16],
    shared_info: Vec<u8>,
}

impl EnvelopeKeys {
    fn derive(shared_secret: &[u8], ephemeral_public: &[u8], shared_info: &[u8]) -> Self {
        let derived = kdf_x963(shared_secret, ephemeral_public, 32);
        let mut enc_key = [0u8; 16];
        let mut mac_key = [0u8; 16];
        enc_key.copy_from_slice(&derived[..16]);
        mac_key.copy_from_slice(&derived[16..32]);
        Self {
            enc_key,
            mac_key,
            shared_info: shared_info.to_vec(),
        }
    }

    fn seal(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let encrypted = aes128_cbc_encrypt(&self.enc_key, &ZERO_IV, plaintext)?;
        let mut mac_input = encrypted.clone();
        mac_input.extend_from_slice(&self.shared_info);
        let mac = hmac_sha256(&self.mac_key, &mac_input)?;
        Ok((encrypted, mac.to_vec()))
    }

    fn open(&self, encrypted_data: &[u8], mac: &[u8]) -> Result<Vec<u8>> {
        let mut mac_input = encrypted_data.to_vec();
        mac_input.extend_from_slice(&self.shared_info);
        let expected = hmac_sha256(&self.mac_key, &mac_input)?;
        if !ct_eq(&expected, mac) {
            return Err(CryptoError::MacMismatch);
        }
        aes128_cbc_decrypt(&self.enc_key, &ZERO_IV, encrypted_data)
    }
}

/// sender side of the envelope. used by clients and by tests.
pub struct EciesEncryptor {
    keys: EnvelopeKeys,
    ephemeral_public_key: Vec<u8>,
}

impl EciesEncryptor {
    /// set up an encryptor towards `recipient_public`.
    pub fn new(recipient_public: &PublicKey, shared_info: &[u8]) -> Self {
        let (ephemeral_private, ephemeral_public) = keys::generate_keypair();
        let ephemeral_public_bytes = keys::public_key_to_bytes(&ephemeral_public);
        let shared = keys::shared_secret(&ephemeral_private, recipient_public);
        Self {
            keys: EnvelopeKeys::derive(&shared, &ephemeral_public_bytes, shared_info),
            ephemeral_public_key: ephemeral_public_bytes,
        }
    }

    /// seal a request payload.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EciesEnvelope> {
        let (encrypted_data, mac) = self.keys.seal(plaintext)?;
        Ok(EciesEnvelope {
            ephemeral_public_key: self.ephemeral_public_key.clone(),
            encrypted_data,
            mac,
        })
    }

    /// open a response sealed with the same derived keys.
    pub fn decrypt_response(&self, encrypted_data: &[u8], mac: &[u8]) -> Result<Vec<u8>> {
        self.keys.open(encrypted_data, mac)
    }
}

/// recipient side of the envelope.
pub struct EciesDecryptor {
    keys: EnvelopeKeys,
}

impl EciesDecryptor {
    /// derive keys from the recipient's static private key and the envelope's
    /// ephemeral public key.
    pub fn new(
        recipient_private: &SecretKey,
        ephemeral_public_key: &[u8],
        shared_info: &[u8],
    ) -> Result<Self> {
        let ephemeral = keys::public_key_from_bytes(ephemeral_public_key)?;
        let shared = keys::shared_secret(recipient_private, &ephemeral);
        Ok(Self {
            keys: EnvelopeKeys::derive(&shared, ephemeral_public_key, shared_info),
        })
    }

    /// verify the MAC and open a request payload.
    pub fn decrypt(&self, encrypted_data: &[u8], mac: &[u8]) -> Result<Vec<u8>> {
        self.keys.open(encrypted_data, mac)
    }

    /// seal a response with the request's derived keys.
    pub fn encrypt_response(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        self.keys.seal(plaintext)
    }
}
