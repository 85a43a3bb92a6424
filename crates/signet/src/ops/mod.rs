//! service operations.
//!
//! each operation is a function from `(&AppState, Request) -> Result<Response>`
//! and owns its transactional boundary. handlers stay thin wrappers.

pub mod activation;
pub mod signature;
pub mod vault;

use base64::prelude::*;
use chrono::Utc;
use p256::{PublicKey, SecretKey};
use subtle::ConstantTimeEq;

use signet_crypto::{keys, server_key};
use signet_db::ActivationTransaction;
use signet_types::{
    Activation, ActivationHistoryEntry, ActivationStatus, KeyEncryptionMode, MasterKeyPair,
    ServiceError,
};

use crate::callback::StatusChangeEvent;
use crate::AppState;

/// statuses in which an activation code is live and reserved.
pub(crate) const PENDING_STATES: &[ActivationStatus] =
    &[ActivationStatus::Created, ActivationStatus::PendingCommit];

/// user id reported for records that must not be distinguishable from removed
/// ones.
pub(crate) const UNKNOWN_USER_ID: &str = "UNKNOWN";

pub(crate) fn db_err(e: signet_db::Error) -> ServiceError {
    ServiceError::Database(e.to_string())
}

pub(crate) fn crypto_err(e: signet_crypto::CryptoError) -> ServiceError {
    ServiceError::CryptoFailure(e.to_string())
}

/// decode a Base64 request field, mapping failures to an input error.
pub(crate) fn decode_b64(field: &'static str, value: &str) -> Result<Vec<u8>, ServiceError> {
    BASE64_STANDARD
        .decode(value)
        .map_err(|_| ServiceError::InvalidInput(format!("malformed base64 in {}", field)))
}

/// parse the master private key of a keypair record. a malformed stored key is
/// a configuration problem, not a client one.
pub(crate) fn load_master_private_key(pair: &MasterKeyPair) -> Result<SecretKey, ServiceError> {
    let bytes = BASE64_STANDARD
        .decode(&pair.master_key_private)
        .map_err(|_| ServiceError::NoMasterKeyPair)?;
    keys::private_key_from_bytes(&bytes).map_err(|_| ServiceError::NoMasterKeyPair)
}

/// load and, if necessary, decrypt the per-activation server private key.
pub(crate) fn load_server_private_key(
    state: &AppState,
    activation: &Activation,
) -> Result<SecretKey, ServiceError> {
    let stored = BASE64_STANDARD
        .decode(&activation.server_private_key)
        .map_err(|_| ServiceError::CryptoFailure("stored server key unreadable".to_string()))?;
    let raw = match activation.server_private_key_encryption {
        KeyEncryptionMode::NoEncryption => stored,
        KeyEncryptionMode::AesHmac => server_key::decrypt_server_private_key(
            state.master_db_key()?,
            &activation.user_id,
            &activation.activation_id,
            &stored,
        )
        .map_err(crypto_err)?,
    };
    keys::private_key_from_bytes(&raw).map_err(crypto_err)
}

/// parse the stored device public key. absent or malformed keys are crypto
/// failures; the caller decides whether that tombstones the record.
pub(crate) fn load_device_public_key(activation: &Activation) -> Result<PublicKey, ServiceError> {
    let encoded = activation
        .device_public_key
        .as_deref()
        .ok_or_else(|| ServiceError::CryptoFailure("device key not set".to_string()))?;
    let bytes = BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| ServiceError::CryptoFailure("stored device key unreadable".to_string()))?;
    keys::public_key_from_bytes(&bytes).map_err(crypto_err)
}

/// shared info binding the key-exchange envelope to the application credential.
pub(crate) fn activation_shared_info(application_secret: &str) -> Vec<u8> {
    let mut info = signet_crypto::activation::ACTIVATION_SHARED_INFO.to_vec();
    info.push(b'&');
    info.extend_from_slice(application_secret.as_bytes());
    info
}

/// constant-time comparison of a stored OTP against a provided one.
pub(crate) fn otp_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (Some(expected), Some(provided)) => {
            expected.len() == provided.len()
                && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
        }
        (None, None) => true,
        _ => false,
    }
}

/// build a history entry for the activation's current status.
pub(crate) fn history_entry(
    activation: &Activation,
    event_reason: Option<&str>,
    external_user_id: Option<&str>,
) -> ActivationHistoryEntry {
    ActivationHistoryEntry {
        id: 0,
        activation_id: activation.activation_id.clone(),
        activation_status: activation.activation_status,
        event_reason: event_reason.map(str::to_owned),
        external_user_id: external_user_id.map(str::to_owned),
        timestamp_created: Utc::now(),
    }
}

/// enqueue a status change callback for the activation's current status.
pub(crate) fn notify_status(state: &AppState, activation: &Activation) {
    state.callbacks.notify(StatusChangeEvent {
        activation_id: activation.activation_id.clone(),
        application_id: activation.application_id,
        activation_status: activation.activation_status,
        timestamp: Utc::now(),
    });
}

/// tombstone the record inside an open transaction and log the transition.
/// the caller commits and fires the callback afterwards.
pub(crate) async fn remove_in_txn(
    txn: &ActivationTransaction,
    activation: &mut Activation,
    event_reason: &str,
) -> Result<(), ServiceError> {
    activation.tombstone();
    txn.store_activation(activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(activation, Some(event_reason), None))
        .await
        .map_err(db_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_matches() {
        assert!(otp_matches(Some("12345"), Some("12345")));
        assert!(!otp_matches(Some("12345"), Some("54321")));
        assert!(!otp_matches(Some("12345"), Some("1234")));
        assert!(!otp_matches(Some("12345"), None));
        assert!(!otp_matches(None, Some("12345")));
        assert!(otp_matches(None, None));
    }

    #[test]
    fn test_decode_b64_error_names_field() {
        let err = decode_b64("ephemeralPublicKey", "not-base64!").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(err.to_string().contains("ephemeralPublicKey"));
    }

    #[test]
    fn test_shared_info_binds_secret() {
        let a = activation_shared_info("c2VjcmV0QQ==");
        let b = activation_shared_info("c2VjcmV0Qg==");
        assert_ne!(a, b);
    }
}
