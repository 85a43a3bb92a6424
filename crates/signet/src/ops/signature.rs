//! signature verification operations.
//!
//! every verification is one locked read-modify-write: re-read the record,
//! evaluate the signature against the stored counter and the lookahead
//! window, advance the counter (by the matched distance on success, by
//! exactly one on failure), update the failure budget and append the audit
//! entry - all committed atomically.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use signet_crypto::kdf::{derive_master_secret, derive_signature_keys};
use signet_crypto::signature::{
    compute_signature, counter_bytes, data_fingerprint, next_ctr_data, signature_base,
    signatures_match, CTR_DATA_LEN,
};
use signet_crypto::keys;
use signet_db::{ActivationTransaction, Database};
use signet_types::{
    Activation, ActivationStatus, ApplicationVersion, ServiceError, SignatureAuditEntry,
    SignatureAuditResult, SignatureType,
};

use super::{
    crypto_err, db_err, decode_b64, history_entry, load_device_public_key,
    load_server_private_key, notify_status, remove_in_txn, UNKNOWN_USER_ID,
};
use crate::AppState;

/// reason stored when the failure budget trips the lockout.
pub const BLOCKED_REASON_MAX_FAILED_ATTEMPTS: &str = "MAX_FAILED_ATTEMPTS";

/// request for `verifySignature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureRequest {
    pub activation_id: String,
    pub application_key: String,
    /// canonical signed data, passed through verbatim.
    pub data: String,
    /// client signature: 8-digit groups joined by `-`.
    pub signature: String,
    pub signature_type: SignatureType,
    /// overrides the record's pinned protocol generation for computation
    /// only; the record itself is never rewritten.
    #[serde(default)]
    pub forced_signature_version: Option<u32>,
}

/// response for `verifySignature`.
///
/// a failed verification is a negative result, not an error; the coarse
/// fields here are all a caller learns about why.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureResponse {
    pub signature_valid: bool,
    pub activation_id: String,
    pub activation_status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    pub user_id: String,
    pub application_id: i64,
    pub remaining_attempts: u32,
    pub signature_type: SignatureType,
}

fn invalid_response(
    activation: &Activation,
    signature_type: SignatureType,
) -> VerifySignatureResponse {
    VerifySignatureResponse {
        signature_valid: false,
        activation_id: activation.activation_id.clone(),
        activation_status: activation.activation_status,
        blocked_reason: activation.blocked_reason.clone(),
        user_id: activation.user_id.clone(),
        application_id: activation.application_id,
        remaining_attempts: activation.remaining_attempts(),
        signature_type,
    }
}

/// synthetic response for ids that do not exist; indistinguishable from a
/// removed record.
fn unknown_activation_response(
    activation_id: String,
    signature_type: SignatureType,
) -> VerifySignatureResponse {
    VerifySignatureResponse {
        signature_valid: false,
        activation_id,
        activation_status: ActivationStatus::Removed,
        blocked_reason: None,
        user_id: UNKNOWN_USER_ID.to_string(),
        application_id: 0,
        remaining_attempts: 0,
        signature_type,
    }
}

fn audit_entry(
    activation: &Activation,
    request: &VerifySignatureRequest,
    result: SignatureAuditResult,
    note: Option<&str>,
    counter: u64,
) -> SignatureAuditEntry {
    SignatureAuditEntry {
        id: 0,
        activation_id: activation.activation_id.clone(),
        application_id: activation.application_id,
        user_id: activation.user_id.clone(),
        signature_type: request.signature_type,
        data_fingerprint: data_fingerprint(request.data.as_bytes()),
        result,
        note: note.map(str::to_owned),
        counter,
        timestamp_created: Utc::now(),
    }
}

/// verify a request signature and advance the counter.
pub async fn verify_signature(
    state: &AppState,
    request: VerifySignatureRequest,
) -> Result<VerifySignatureResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Ok(unknown_activation_response(
            request.activation_id,
            request.signature_type,
        ));
    };

    // lazy expiration: uncommitted records past their window are removed
    if activation.is_expired(Utc::now()) {
        remove_in_txn(&txn, &mut activation, "activation_expired").await?;
        txn.commit().await.map_err(db_err)?;
        notify_status(state, &activation);
        return Ok(invalid_response(&activation, request.signature_type));
    }

    // only ACTIVE records can verify, but the attempt still consumes one
    // counter step so the base string can never be replayed later
    if activation.activation_status != ActivationStatus::Active {
        let counter_at_eval = activation.counter;
        activation.counter += 1;
        if let Some(ctr) = activation.ctr_data.take() {
            activation.ctr_data = Some(advance_ctr(&ctr, 1)?);
        }
        activation.timestamp_last_used = Utc::now();
        txn.store_activation(&activation).await.map_err(db_err)?;
        txn.append_signature_audit(&audit_entry(
            &activation,
            &request,
            SignatureAuditResult::Failed,
            Some("activation not active"),
            counter_at_eval,
        ))
        .await
        .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        return Ok(invalid_response(&activation, request.signature_type));
    }

    let version = state
        .db
        .get_application_version_by_key(&request.application_key)
        .await
        .map_err(db_err)?
        .filter(|v| v.supported && v.application_id == activation.application_id);
    let Some(version) = version else {
        // wrong credentials burn an attempt exactly like a bad signature
        return finalize_failure(state, txn, activation, &request, "invalid application key")
            .await;
    };

    match find_matching_offset(state, &activation, &version, &request) {
        Err(_) => {
            // invalid key material on this record: remove it and answer with
            // the generic expiry error so the failure mode is not observable
            remove_in_txn(&txn, &mut activation, "signature_crypto_failure").await?;
            txn.commit().await.map_err(db_err)?;
            notify_status(state, &activation);
            Err(ServiceError::ActivationExpired)
        }
        Ok(Some(offset)) => {
            let counter_at_eval = activation.counter;
            let steps = offset as u64 + 1;
            activation.counter += steps;
            if let Some(ctr) = activation.ctr_data.take() {
                activation.ctr_data = Some(advance_ctr(&ctr, steps)?);
            }
            activation.failed_attempts = 0;
            activation.timestamp_last_used = Utc::now();

            txn.store_activation(&activation).await.map_err(db_err)?;
            txn.append_signature_audit(&audit_entry(
                &activation,
                &request,
                SignatureAuditResult::Ok,
                None,
                counter_at_eval,
            ))
            .await
            .map_err(db_err)?;
            txn.commit().await.map_err(db_err)?;

            info!(
                activation_id = %activation.activation_id,
                offset,
                "signature verified"
            );

            Ok(VerifySignatureResponse {
                signature_valid: true,
                activation_id: activation.activation_id.clone(),
                activation_status: activation.activation_status,
                blocked_reason: None,
                user_id: activation.user_id.clone(),
                application_id: activation.application_id,
                remaining_attempts: activation.remaining_attempts(),
                signature_type: request.signature_type,
            })
        }
        Ok(None) => finalize_failure(state, txn, activation, &request, "signature mismatch").await,
    }
}

/// record a failed attempt: the counter advances by exactly one so the prior
/// base string can never be replayed, and crossing the failure budget blocks
/// the activation in the same transaction.
async fn finalize_failure(
    state: &AppState,
    txn: ActivationTransaction,
    mut activation: Activation,
    request: &VerifySignatureRequest,
    note: &str,
) -> Result<VerifySignatureResponse, ServiceError> {
    let counter_at_eval = activation.counter;
    activation.counter += 1;
    if let Some(ctr) = activation.ctr_data.take() {
        activation.ctr_data = Some(advance_ctr(&ctr, 1)?);
    }
    activation.failed_attempts += 1;
    activation.timestamp_last_used = Utc::now();

    let mut blocked_now = false;
    if activation.failed_attempts >= activation.max_failed_attempts {
        activation.activation_status = ActivationStatus::Blocked;
        activation.blocked_reason = Some(BLOCKED_REASON_MAX_FAILED_ATTEMPTS.to_string());
        txn.append_activation_history(&history_entry(
            &activation,
            activation.blocked_reason.as_deref(),
            None,
        ))
        .await
        .map_err(db_err)?;
        blocked_now = true;
    }

    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_signature_audit(&audit_entry(
        &activation,
        request,
        SignatureAuditResult::Failed,
        Some(note),
        counter_at_eval,
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;

    if blocked_now {
        notify_status(state, &activation);
    }

    Ok(invalid_response(&activation, request.signature_type))
}

fn advance_ctr(ctr: &[u8], steps: u64) -> Result<Vec<u8>, ServiceError> {
    if ctr.len() != CTR_DATA_LEN {
        return Err(ServiceError::CryptoFailure(
            "stored ctr data has wrong length".to_string(),
        ));
    }
    let mut current = [0u8; CTR_DATA_LEN];
    current.copy_from_slice(ctr);
    for _ in 0..steps {
        current = next_ctr_data(&current);
    }
    Ok(current.to_vec())
}

/// evaluate the signature against the stored counter and the next
/// `lookahead` values. returns the matching offset, `None` when nothing in
/// the window matches, or an error for unusable key material.
fn find_matching_offset(
    state: &AppState,
    activation: &Activation,
    version: &ApplicationVersion,
    request: &VerifySignatureRequest,
) -> Result<Option<u32>, ServiceError> {
    let server_private = load_server_private_key(state, activation)?;
    let device_public = load_device_public_key(activation)?;
    let shared = keys::shared_secret(&server_private, &device_public);
    let master_secret = derive_master_secret(&shared).map_err(crypto_err)?;
    let factor_keys = derive_signature_keys(&master_secret).map_err(crypto_err)?;

    let effective_version = request
        .forced_signature_version
        .unwrap_or(activation.version);
    let lookahead = state.config.signature.validation_lookahead;

    if effective_version >= 3 {
        // hash-chain counter. a record that never ran the upgrade has no
        // chain; nothing in the window can match, which costs the client one
        // failed attempt rather than the whole record.
        let Some(stored) = activation.ctr_data.as_deref() else {
            return Ok(None);
        };
        if stored.len() != CTR_DATA_LEN {
            return Err(ServiceError::CryptoFailure(
                "stored ctr data has wrong length".to_string(),
            ));
        }
        let mut ctr = [0u8; CTR_DATA_LEN];
        ctr.copy_from_slice(stored);
        for offset in 0..=lookahead {
            let base = signature_base(
                request.data.as_bytes(),
                &ctr,
                &version.application_secret,
            );
            let expected = compute_signature(&factor_keys, request.signature_type, &base)
                .map_err(crypto_err)?;
            if signatures_match(&expected, &request.signature) {
                return Ok(Some(offset));
            }
            ctr = next_ctr_data(&ctr);
        }
    } else {
        // legacy integer counter
        for offset in 0..=lookahead {
            let ctr_bytes = counter_bytes(activation.counter + u64::from(offset));
            let base = signature_base(
                request.data.as_bytes(),
                &ctr_bytes,
                &version.application_secret,
            );
            let expected = compute_signature(&factor_keys, request.signature_type, &base)
                .map_err(crypto_err)?;
            if signatures_match(&expected, &request.signature) {
                return Ok(Some(offset));
            }
        }
    }
    Ok(None)
}

// ─── ECDSA verification ─────────────────────────────────────────────────────

/// request for `verifyEcdsaSignature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEcdsaSignatureRequest {
    pub activation_id: String,
    /// signed data, Base64.
    pub data: String,
    /// DER signature, Base64.
    pub signature: String,
}

/// response for `verifyEcdsaSignature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEcdsaSignatureResponse {
    pub signature_valid: bool,
}

/// verify an asymmetric device signature over out-of-band data.
///
/// independent of the symmetric engine: no counter is involved and nothing is
/// mutated. records that are missing or not `ACTIVE` verify negative.
pub async fn verify_ecdsa_signature(
    state: &AppState,
    request: VerifyEcdsaSignatureRequest,
) -> Result<VerifyEcdsaSignatureResponse, ServiceError> {
    let data = decode_b64("data", &request.data)?;
    let signature = decode_b64("signature", &request.signature)?;

    let activation = state
        .db
        .get_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(activation) =
        activation.filter(|a| a.activation_status == ActivationStatus::Active)
    else {
        return Ok(VerifyEcdsaSignatureResponse {
            signature_valid: false,
        });
    };

    let device_public = load_device_public_key(&activation)?;
    Ok(VerifyEcdsaSignatureResponse {
        signature_valid: keys::ecdsa_verify_der(&device_public, &data, &signature),
    })
}
