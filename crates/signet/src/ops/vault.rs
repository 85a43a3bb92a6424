//! vault unlock.
//!
//! the caller's signature is verified first (advancing the counter exactly
//! once, success or failure); only a valid signature on an `ACTIVE` record
//! releases the wrapped vault encryption key.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use signet_crypto::vault::encrypt_vault_encryption_key;
use signet_db::Database;
use signet_types::{ActivationStatus, ServiceError, SignatureType};

use super::signature::{verify_signature, VerifySignatureRequest};
use super::{crypto_err, db_err, load_device_public_key, load_server_private_key};
use crate::AppState;

/// request for `unlockVault`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultUnlockRequest {
    pub activation_id: String,
    pub application_key: String,
    /// canonical signed data for the unlock request.
    pub data: String,
    pub signature: String,
    pub signature_type: SignatureType,
    #[serde(default)]
    pub forced_signature_version: Option<u32>,
}

/// response for `unlockVault`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultUnlockResponse {
    pub activation_id: String,
    pub user_id: String,
    pub activation_status: ActivationStatus,
    pub remaining_attempts: u32,
    pub signature_valid: bool,
    /// wrapped vault key, Base64. `None` unless the signature verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_vault_encryption_key: Option<String>,
}

/// verify the unlock signature and, on success, hand out the wrapped vault
/// encryption key.
pub async fn unlock_vault(
    state: &AppState,
    request: VaultUnlockRequest,
) -> Result<VaultUnlockResponse, ServiceError> {
    // the verification owns the counter advance; one unlock call moves the
    // counter exactly once regardless of outcome
    let verification = verify_signature(
        state,
        VerifySignatureRequest {
            activation_id: request.activation_id.clone(),
            application_key: request.application_key,
            data: request.data,
            signature: request.signature,
            signature_type: request.signature_type,
            forced_signature_version: request.forced_signature_version,
        },
    )
    .await?;

    if !verification.signature_valid
        || verification.activation_status != ActivationStatus::Active
    {
        // covers unknown activations too: the verification already reports
        // them as REMOVED with an UNKNOWN user
        return Ok(VaultUnlockResponse {
            activation_id: verification.activation_id,
            user_id: verification.user_id,
            activation_status: verification.activation_status,
            remaining_attempts: verification.remaining_attempts,
            signature_valid: false,
            encrypted_vault_encryption_key: None,
        });
    }

    let activation = state
        .db
        .get_activation(&verification.activation_id)
        .await
        .map_err(db_err)?
        .ok_or(ServiceError::ActivationNotFound)?;

    let server_private = load_server_private_key(state, &activation)?;
    let device_public = load_device_public_key(&activation)?;
    let wrapped =
        encrypt_vault_encryption_key(&server_private, &device_public).map_err(crypto_err)?;

    Ok(VaultUnlockResponse {
        activation_id: verification.activation_id,
        user_id: verification.user_id,
        activation_status: verification.activation_status,
        remaining_attempts: verification.remaining_attempts,
        signature_valid: true,
        encrypted_vault_encryption_key: Some(BASE64_STANDARD.encode(wrapped)),
    })
}
