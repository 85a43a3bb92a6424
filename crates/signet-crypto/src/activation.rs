//! activation provisioning crypto: code signatures, the application signature
//! and the legacy (v2) key transport.
//!
//! the current protocol wraps key exchange in the [`crate::ecies`] envelope;
//! the legacy transport encrypts the device key with two AES layers - an
//! OTP-derived layer inside and an ephemeral-ECDH layer outside - using the
//! activation nonce as IV for both.

use base64::prelude::*;
use p256::{PublicKey, SecretKey};

use crate::cipher::{aes128_cbc_decrypt, aes128_cbc_encrypt, ct_eq, hmac_sha256};
use crate::kdf::kdf_x963;
use crate::keys;
use crate::{CryptoError, Result};

/// length of an activation nonce (one AES block, doubles as the IV).
pub const ACTIVATION_NONCE_LEN: usize = 16;

/// shared info binding the key-exchange envelope to its purpose.
pub const ACTIVATION_SHARED_INFO: &[u8] = b"/pa/activation";

/// generate a random activation nonce.
pub fn generate_activation_nonce() -> [u8; ACTIVATION_NONCE_LEN] {
    use rand::RngCore;
    let mut rng = rand::rng();
    let mut nonce = [0u8; ACTIVATION_NONCE_LEN];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// sign advertised activation data (the code, or `short_id-otp` for legacy)
/// with the application master private key. DER-encoded ECDSA.
pub fn compute_activation_signature(data: &str, master_private: &SecretKey) -> Result<Vec<u8>> {
    keys::ecdsa_sign_der(master_private, data.as_bytes())
}

/// verify an activation signature against the master public key.
pub fn verify_activation_signature(
    data: &str,
    signature: &[u8],
    master_public: &PublicKey,
) -> bool {
    keys::ecdsa_verify_der(master_public, data.as_bytes(), signature)
}

/// compute the application signature authenticating a legacy envelope:
/// `HMAC-SHA-256(app_secret, identity & b64(nonce) & b64(C_devicePub) & app_key)`.
pub fn compute_application_signature(
    identity: &str,
    activation_nonce: &[u8],
    c_device_public_key: &[u8],
    application_key: &str,
    application_secret: &str,
) -> Result<[u8; 32]> {
    let base = format!(
        "{}&{}&{}&{}",
        identity,
        BASE64_STANDARD.encode(activation_nonce),
        BASE64_STANDARD.encode(c_device_public_key),
        application_key,
    );
    let secret = BASE64_STANDARD
        .decode(application_secret)
        .map_err(|_| CryptoError::InvalidLength("application secret"))?;
    hmac_sha256(&secret, base.as_bytes())
}

/// validate an application signature in constant time.
pub fn validate_application_signature(
    identity: &str,
    activation_nonce: &[u8],
    c_device_public_key: &[u8],
    application_key: &str,
    application_secret: &str,
    signature: &[u8],
) -> Result<bool> {
    let expected = compute_application_signature(
        identity,
        activation_nonce,
        c_device_public_key,
        application_key,
        application_secret,
    )?;
    Ok(ct_eq(&expected, signature))
}

/// key for the OTP layer: KDF_X9.63 over `identity-otp` keyed by the nonce.
fn derive_otp_layer_key(identity: &str, activation_otp: &str, nonce: &[u8]) -> [u8; 16] {
    let secret = format!("{}-{}", identity, activation_otp);
    let derived = kdf_x963(secret.as_bytes(), nonce, 16);
    let mut key = [0u8; 16];
    key.copy_from_slice(&derived);
    key
}

/// key for the ephemeral layer: KDF_X9.63 over the ECDH output keyed by the nonce.
fn derive_ephemeral_layer_key(shared_secret: &[u8], nonce: &[u8]) -> [u8; 16] {
    let derived = kdf_x963(shared_secret, nonce, 16);
    let mut key = [0u8; 16];
    key.copy_from_slice(&derived);
    key
}

/// client-side seal of the device public key for the legacy transport.
///
/// inner layer under the OTP-derived key, outer layer under the ephemeral
/// ECDH key agreed with the application master public key.
pub fn encrypt_device_public_key_legacy(
    device_public: &PublicKey,
    identity: &str,
    ephemeral_private: &SecretKey,
    master_public: &PublicKey,
    activation_otp: &str,
    activation_nonce: &[u8],
) -> Result<Vec<u8>> {
    let device_bytes = keys::public_key_to_bytes(device_public);
    let otp_key = derive_otp_layer_key(identity, activation_otp, activation_nonce);
    let inner = aes128_cbc_encrypt(&otp_key, activation_nonce, &device_bytes)?;

    let shared = keys::shared_secret(ephemeral_private, master_public);
    let ephemeral_key = derive_ephemeral_layer_key(&shared, activation_nonce);
    aes128_cbc_encrypt(&ephemeral_key, activation_nonce, &inner)
}

/// server-side open of the legacy device key transport.
///
/// the ephemeral layer is only present when the client supplied an ephemeral
/// public key.
pub fn decrypt_device_public_key_legacy(
    c_device_public_key: &[u8],
    identity: &str,
    master_private: &SecretKey,
    ephemeral_public: Option<&PublicKey>,
    activation_otp: &str,
    activation_nonce: &[u8],
) -> Result<PublicKey> {
    let inner = match ephemeral_public {
        Some(ephemeral) => {
            let shared = keys::shared_secret(master_private, ephemeral);
            let ephemeral_key = derive_ephemeral_layer_key(&shared, activation_nonce);
            aes128_cbc_decrypt(&ephemeral_key, activation_nonce, c_device_public_key)?
        }
        None => c_device_public_key.to_vec(),
    };
    let otp_key = derive_otp_layer_key(identity, activation_otp, activation_nonce);
    let device_bytes = aes128_cbc_decrypt(&otp_key, activation_nonce, &inner)?;
    keys::public_key_from_bytes(&device_bytes)
}

/// server-side seal of the server public key for the legacy transport.
///
/// layers mirror the device key transport: OTP-derived key inside, key agreed
/// between the server's ephemeral private key and the device public key outside.
pub fn encrypt_server_public_key_legacy(
    server_public: &PublicKey,
    device_public: &PublicKey,
    ephemeral_private: &SecretKey,
    activation_otp: &str,
    identity: &str,
    activation_nonce: &[u8],
) -> Result<Vec<u8>> {
    let server_bytes = keys::public_key_to_bytes(server_public);
    let otp_key = derive_otp_layer_key(identity, activation_otp, activation_nonce);
    let inner = aes128_cbc_encrypt(&otp_key, activation_nonce, &server_bytes)?;

    let shared = keys::shared_secret(ephemeral_private, device_public);
    let ephemeral_key = derive_ephemeral_layer_key(&shared, activation_nonce);
    aes128_cbc_encrypt(&ephemeral_key, activation_nonce, &inner)
}

/// client-side open of the legacy server key transport. used by tests.
pub fn decrypt_server_public_key_legacy(
    c_server_public_key: &[u8],
    device_private: &SecretKey,
    ephemeral_public: &PublicKey,
    activation_otp: &str,
    identity: &str,
    activation_nonce: &[u8],
) -> Result<PublicKey> {
    let shared = keys::shared_secret(device_private, ephemeral_public);
    let ephemeral_key = derive_ephemeral_layer_key(&shared, activation_nonce);
    let inner = aes128_cbc_decrypt(&ephemeral_key, activation_nonce, c_server_public_key)?;

    let otp_key = derive_otp_layer_key(identity, activation_otp, activation_nonce);
    let server_bytes = aes128_cbc_decrypt(&otp_key, activation_nonce, &inner)?;
    keys::public_key_from_bytes(&server_bytes)
}

/// sign the encrypted server public key together with the activation id:
/// ECDSA over `activation_id & b64(C_serverPub)`.
pub fn compute_server_data_signature(
    activation_id: &str,
    c_server_public_key: &[u8],
    master_private: &SecretKey,
) -> Result<Vec<u8>> {
    let data = format!(
        "{}&{}",
        activation_id,
        BASE64_STANDARD.encode(c_server_public_key)
    );
    keys::ecdsa_sign_der(master_private, data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_signature_roundtrip() {
        let (master_private, master_public) = keys::generate_keypair();
        let signature =
            compute_activation_signature("CCCCC-CCCCC-CCCCC-DDDDD", &master_private).unwrap();
        assert!(verify_activation_signature(
            "CCCCC-CCCCC-CCCCC-DDDDD",
            &signature,
            &master_public
        ));
        assert!(!verify_activation_signature(
            "CCCCC-CCCCC-CCCCC-EEEEE",
            &signature,
            &master_public
        ));
    }

    #[test]
    fn test_application_signature_roundtrip() {
        let nonce = generate_activation_nonce();
        let c_device = vec![0xaa; 80];
        let signature = compute_application_signature(
            "ABCDE-FGHIJ",
            &nonce,
            &c_device,
            "a2V5",
            "c2VjcmV0MTIzNDU2Nzg5MDE=",
        )
        .unwrap();
        assert!(validate_application_signature(
            "ABCDE-FGHIJ",
            &nonce,
            &c_device,
            "a2V5",
            "c2VjcmV0MTIzNDU2Nzg5MDE=",
            &signature
        )
        .unwrap());
        // wrong identity fails
        assert!(!validate_application_signature(
            "ABCDE-XXXXX",
            &nonce,
            &c_device,
            "a2V5",
            "c2VjcmV0MTIzNDU2Nzg5MDE=",
            &signature
        )
        .unwrap());
    }

    #[test]
    fn test_legacy_device_key_transport_roundtrip() {
        let (master_private, master_public) = keys::generate_keypair();
        let (_, device_public) = keys::generate_keypair();
        let (client_ephemeral_private, client_ephemeral_public) = keys::generate_keypair();
        let nonce = generate_activation_nonce();

        let sealed = encrypt_device_public_key_legacy(
            &device_public,
            "ABCDE-FGHIJ",
            &client_ephemeral_private,
            &master_public,
            "KLMNO-PQRST",
            &nonce,
        )
        .unwrap();

        let opened = decrypt_device_public_key_legacy(
            &sealed,
            "ABCDE-FGHIJ",
            &master_private,
            Some(&client_ephemeral_public),
            "KLMNO-PQRST",
            &nonce,
        )
        .unwrap();
        assert_eq!(opened, device_public);
    }

    #[test]
    fn test_legacy_device_key_transport_wrong_otp_fails() {
        let (master_private, master_public) = keys::generate_keypair();
        let (_, device_public) = keys::generate_keypair();
        let (client_ephemeral_private, client_ephemeral_public) = keys::generate_keypair();
        let nonce = generate_activation_nonce();

        let sealed = encrypt_device_public_key_legacy(
            &device_public,
            "ABCDE-FGHIJ",
            &client_ephemeral_private,
            &master_public,
            "KLMNO-PQRST",
            &nonce,
        )
        .unwrap();

        let result = decrypt_device_public_key_legacy(
            &sealed,
            "ABCDE-FGHIJ",
            &master_private,
            Some(&client_ephemeral_public),
            "WRONG-WRONG",
            &nonce,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_legacy_server_key_transport_roundtrip() {
        let (server_ephemeral_private, server_ephemeral_public) = keys::generate_keypair();
        let (device_private, device_public) = keys::generate_keypair();
        let (_, server_public) = keys::generate_keypair();
        let nonce = generate_activation_nonce();

        let sealed = encrypt_server_public_key_legacy(
            &server_public,
            &device_public,
            &server_ephemeral_private,
            "KLMNO-PQRST",
            "ABCDE-FGHIJ",
            &nonce,
        )
        .unwrap();

        let opened = decrypt_server_public_key_legacy(
            &sealed,
            &device_private,
            &server_ephemeral_public,
            "KLMNO-PQRST",
            "ABCDE-FGHIJ",
            &nonce,
        )
        .unwrap();
        assert_eq!(opened, server_public);
    }
}
