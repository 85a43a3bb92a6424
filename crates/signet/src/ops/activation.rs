//! activation lifecycle operations: init, key exchange (current and legacy),
//! commit, status, remove, block/unblock, OTP rotation and read-side queries.

use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use signet_crypto::activation as activation_crypto;
use signet_crypto::ecies::EciesDecryptor;
use signet_crypto::signature::generate_ctr_data;
use signet_crypto::{keys, server_key};
use signet_db::{ActivationTransaction, Database};
use signet_types::{
    Activation, ActivationCode, ActivationHistoryEntry, ActivationIdShort, ActivationStatus,
    KeyEncryptionMode, MasterKeyPair, OtpValidation, ServiceError,
};

use super::{
    activation_shared_info, crypto_err, db_err, decode_b64, history_entry,
    load_master_private_key, notify_status, otp_matches, remove_in_txn, PENDING_STATES,
    UNKNOWN_USER_ID,
};
use crate::AppState;

// ─── Init ────────────────────────────────────────────────────────────────────

/// request for `initActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitActivationRequest {
    pub user_id: String,
    pub application_id: i64,
    /// protocol generation, 2 or 3. defaults to 3 and is frozen afterwards.
    #[serde(default)]
    pub protocol_version: Option<u32>,
    #[serde(default)]
    pub max_failed_attempts: Option<u32>,
    #[serde(default)]
    pub timestamp_activation_expire: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activation_otp: Option<String>,
    #[serde(default)]
    pub activation_otp_validation: Option<OtpValidation>,
}

/// response for `initActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitActivationResponse {
    pub activation_id: String,
    pub activation_code: String,
    /// ECDSA signature of the advertised code, Base64 DER.
    pub activation_signature: String,
    /// server-generated OTP, returned for legacy records only; it keys the
    /// legacy transport and is handed to the user out of band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_otp: Option<String>,
    pub application_id: i64,
    pub user_id: String,
    pub timestamp_activation_expire: DateTime<Utc>,
}

/// create a new activation record in `CREATED`.
pub async fn init_activation(
    state: &AppState,
    request: InitActivationRequest,
) -> Result<InitActivationResponse, ServiceError> {
    if request.user_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "userId must not be empty".to_string(),
        ));
    }
    let protocol_version = request.protocol_version.unwrap_or(3);
    if !matches!(protocol_version, 2 | 3) {
        return Err(ServiceError::InvalidInput(format!(
            "unsupported protocol version {}",
            protocol_version
        )));
    }
    let otp_validation = request.activation_otp_validation.unwrap_or_default();
    if otp_validation != OtpValidation::None
        && request
            .activation_otp
            .as_deref()
            .is_none_or(|otp| otp.is_empty())
    {
        return Err(ServiceError::InvalidInput(
            "activationOtp is required for the requested validation mode".to_string(),
        ));
    }

    state
        .db
        .get_application(request.application_id)
        .await
        .map_err(db_err)?
        .ok_or(ServiceError::ApplicationNotFound)?;
    let master_pair = state
        .db
        .get_latest_master_key_pair(request.application_id)
        .await
        .map_err(db_err)?
        .ok_or(ServiceError::NoMasterKeyPair)?;
    let master_private = load_master_private_key(&master_pair)?;

    // generate a unique activation id, retrying on collision
    let mut activation_id = None;
    for _ in 0..state.config.activation.id_generation_iterations {
        let candidate = Activation::generate_id();
        if state
            .db
            .get_activation(&candidate)
            .await
            .map_err(db_err)?
            .is_none()
        {
            activation_id = Some(candidate);
            break;
        }
    }
    let activation_id = activation_id.ok_or(ServiceError::UnableToGenerateActivationId)?;

    // generate a code unique across all live pending records
    let mut activation_code = None;
    for _ in 0..state.config.activation.code_generation_iterations {
        let candidate = if protocol_version == 3 {
            ActivationCode::generate().into_inner()
        } else {
            ActivationIdShort::generate().into_inner()
        };
        if !state
            .db
            .activation_code_in_use(&candidate, PENDING_STATES)
            .await
            .map_err(db_err)?
        {
            activation_code = Some(candidate);
            break;
        }
    }
    let activation_code = activation_code.ok_or(ServiceError::UnableToGenerateActivationCode)?;

    // legacy records always carry an OTP; it keys the transport layers
    let activation_otp = if protocol_version == 2 {
        Some(
            request
                .activation_otp
                .filter(|otp| !otp.is_empty())
                .unwrap_or_else(signet_types::generate_legacy_otp),
        )
    } else {
        request.activation_otp.filter(|otp| !otp.is_empty())
    };

    let signature_data = if protocol_version == 2 {
        // legacy clients verify the signature over "shortId-otp"
        match &activation_otp {
            Some(otp) => format!("{}-{}", activation_code, otp),
            None => activation_code.clone(),
        }
    } else {
        activation_code.clone()
    };
    let activation_signature =
        activation_crypto::compute_activation_signature(&signature_data, &master_private)
            .map_err(crypto_err)?;

    // per-activation server keypair
    let (server_private, server_public) = keys::generate_keypair();
    let server_private_bytes = keys::private_key_to_bytes(&server_private);
    let (encryption_mode, stored_private) =
        match state.config.security.server_private_key_encryption {
            KeyEncryptionMode::NoEncryption => (
                KeyEncryptionMode::NoEncryption,
                BASE64_STANDARD.encode(&server_private_bytes),
            ),
            KeyEncryptionMode::AesHmac => {
                let blob = server_key::encrypt_server_private_key(
                    state.master_db_key()?,
                    &request.user_id,
                    &activation_id,
                    &server_private_bytes,
                )
                .map_err(crypto_err)?;
                (KeyEncryptionMode::AesHmac, BASE64_STANDARD.encode(blob))
            }
        };

    let now = Utc::now();
    let timestamp_activation_expire = request.timestamp_activation_expire.unwrap_or_else(|| {
        now + Duration::milliseconds(state.config.activation.validity_ms as i64)
    });

    let activation = Activation {
        activation_id: activation_id.clone(),
        activation_code: activation_code.clone(),
        application_id: request.application_id,
        user_id: request.user_id.clone(),
        master_key_pair_id: master_pair.id,
        server_public_key: BASE64_STANDARD.encode(keys::public_key_to_bytes(&server_public)),
        server_private_key: stored_private,
        server_private_key_encryption: encryption_mode,
        device_public_key: None,
        activation_name: None,
        extras: None,
        counter: 0,
        ctr_data: None,
        failed_attempts: 0,
        max_failed_attempts: request
            .max_failed_attempts
            .unwrap_or(state.config.signature.max_failed_attempts),
        activation_status: ActivationStatus::Created,
        blocked_reason: None,
        activation_otp,
        activation_otp_validation: otp_validation,
        version: protocol_version,
        activation_flags: vec![],
        timestamp_created: now,
        timestamp_activation_expire,
        timestamp_last_used: now,
    };

    let activation = state.db.create_activation(&activation).await.map_err(db_err)?;
    state
        .db
        .append_activation_history(&history_entry(&activation, None, None))
        .await
        .map_err(db_err)?;
    notify_status(state, &activation);

    info!(activation_id = %activation.activation_id, version = protocol_version, "activation initialized");

    Ok(InitActivationResponse {
        activation_id,
        activation_code,
        activation_signature: BASE64_STANDARD.encode(activation_signature),
        activation_otp: if protocol_version == 2 {
            activation.activation_otp
        } else {
            None
        },
        application_id: request.application_id,
        user_id: request.user_id,
        timestamp_activation_expire,
    })
}

// ─── Key Exchange (current protocol) ─────────────────────────────────────────

/// request for `prepareActivation`: the sealed device key envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareActivationRequest {
    pub activation_code: String,
    pub application_key: String,
    /// sender's ephemeral public key, Base64 SEC1.
    pub ephemeral_public_key: String,
    /// sealed [`ActivationLayer2Request`], Base64.
    pub encrypted_data: String,
    /// envelope MAC, Base64.
    pub mac: String,
}

/// response for `prepareActivation`: the sealed server key payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareActivationResponse {
    pub activation_id: String,
    /// sealed [`ActivationLayer2Response`], Base64.
    pub encrypted_data: String,
    /// envelope MAC, Base64.
    pub mac: String,
    pub activation_status: ActivationStatus,
}

/// plaintext carried inside the key exchange envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationLayer2Request {
    /// device public key, Base64 SEC1.
    pub device_public_key: String,
    #[serde(default)]
    pub activation_name: Option<String>,
    #[serde(default)]
    pub extras: Option<String>,
    #[serde(default)]
    pub activation_otp: Option<String>,
}

/// plaintext returned inside the key exchange envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationLayer2Response {
    pub activation_id: String,
    /// server public key, Base64 SEC1.
    pub server_public_key: String,
    /// initial hash-chain counter, Base64 of 16 bytes.
    pub ctr_data: String,
}

struct OpenedExchange {
    decryptor: EciesDecryptor,
    payload: ActivationLayer2Request,
    device_public_key: Vec<u8>,
}

/// open the envelope and parse its payload. any failure here is a crypto
/// failure; the caller owns the tombstoning policy.
fn open_key_exchange(
    master_private: &p256::SecretKey,
    ephemeral_public_key: &[u8],
    encrypted_data: &[u8],
    mac: &[u8],
    shared_info: &[u8],
) -> Result<OpenedExchange, ServiceError> {
    let decryptor = EciesDecryptor::new(master_private, ephemeral_public_key, shared_info)
        .map_err(crypto_err)?;
    let plaintext = decryptor.decrypt(encrypted_data, mac).map_err(crypto_err)?;
    let payload: ActivationLayer2Request = serde_json::from_slice(&plaintext)
        .map_err(|_| ServiceError::CryptoFailure("malformed key exchange payload".to_string()))?;
    let device_public_key = BASE64_STANDARD
        .decode(&payload.device_public_key)
        .map_err(|_| ServiceError::CryptoFailure("malformed device key".to_string()))?;
    // reject anything that is not a valid curve point up front
    keys::public_key_from_bytes(&device_public_key).map_err(crypto_err)?;
    Ok(OpenedExchange {
        decryptor,
        payload,
        device_public_key,
    })
}

/// record an OTP mismatch: bump the failed counter and, once the budget is
/// exhausted, remove the uncommitted record.
async fn register_otp_failure(
    state: &AppState,
    txn: ActivationTransaction,
    activation: &mut Activation,
) -> ServiceError {
    activation.failed_attempts += 1;
    if activation.failed_attempts >= activation.max_failed_attempts {
        if let Err(e) = remove_in_txn(&txn, activation, "otp_attempts_exhausted").await {
            return e;
        }
        if let Err(e) = txn.commit().await.map_err(db_err) {
            return e;
        }
        notify_status(state, activation);
        return ServiceError::InvalidActivationOtp;
    }
    if let Err(e) = txn.store_activation(activation).await.map_err(db_err) {
        return e;
    }
    if let Err(e) = txn.commit().await.map_err(db_err) {
        return e;
    }
    ServiceError::InvalidActivationOtp
}

/// remove the record, commit, notify, and surface the generic expiry error.
async fn fail_key_exchange(
    state: &AppState,
    txn: ActivationTransaction,
    activation: &mut Activation,
    event_reason: &str,
) -> ServiceError {
    if let Err(e) = remove_in_txn(&txn, activation, event_reason).await {
        return e;
    }
    if let Err(e) = txn.commit().await.map_err(db_err) {
        return e;
    }
    notify_status(state, activation);
    ServiceError::ActivationExpired
}

/// complete the device key exchange for a `CREATED` activation.
pub async fn prepare_activation(
    state: &AppState,
    request: PrepareActivationRequest,
) -> Result<PrepareActivationResponse, ServiceError> {
    // malformed input never touches state
    let ephemeral_public_key = decode_b64("ephemeralPublicKey", &request.ephemeral_public_key)?;
    let encrypted_data = decode_b64("encryptedData", &request.encrypted_data)?;
    let mac = decode_b64("mac", &request.mac)?;

    // unknown or unsupported applications are indistinguishable from expiry
    let version = state
        .db
        .get_application_version_by_key(&request.application_key)
        .await
        .map_err(db_err)?
        .filter(|v| v.supported)
        .ok_or(ServiceError::ActivationExpired)?;

    let (txn, record) = state
        .db
        .begin_activation_by_code(
            version.application_id,
            &request.activation_code,
            &[ActivationStatus::Created],
        )
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationExpired);
    };

    if activation.is_expired(Utc::now()) {
        return Err(fail_key_exchange(state, txn, &mut activation, "activation_expired").await);
    }

    let master_pair = load_master_pair(state, &activation).await?;
    let master_private = load_master_private_key(&master_pair)?;
    let shared_info = activation_shared_info(&version.application_secret);

    let exchange = match open_key_exchange(
        &master_private,
        &ephemeral_public_key,
        &encrypted_data,
        &mac,
        &shared_info,
    ) {
        Ok(exchange) => exchange,
        Err(_) => {
            return Err(
                fail_key_exchange(state, txn, &mut activation, "key_exchange_failed").await,
            );
        }
    };

    if activation.activation_otp_validation == OtpValidation::OnKeyExchange
        && !otp_matches(
            activation.activation_otp.as_deref(),
            exchange.payload.activation_otp.as_deref(),
        )
    {
        return Err(register_otp_failure(state, txn, &mut activation).await);
    }

    // device key is set exactly once, here
    activation.device_public_key = Some(BASE64_STANDARD.encode(&exchange.device_public_key));
    activation.activation_name = exchange.payload.activation_name.clone();
    activation.extras = exchange.payload.extras.clone();
    activation.activation_status = ActivationStatus::PendingCommit;
    let ctr_data = generate_ctr_data();
    activation.ctr_data = Some(ctr_data.to_vec());

    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(&activation, None, None))
        .await
        .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    info!(activation_id = %activation.activation_id, "device key exchange completed");

    seal_exchange_response(&exchange.decryptor, &activation, &ctr_data)
}

fn seal_exchange_response(
    decryptor: &EciesDecryptor,
    activation: &Activation,
    ctr_data: &[u8],
) -> Result<PrepareActivationResponse, ServiceError> {
    let payload = ActivationLayer2Response {
        activation_id: activation.activation_id.clone(),
        server_public_key: activation.server_public_key.clone(),
        ctr_data: BASE64_STANDARD.encode(ctr_data),
    };
    let plaintext = serde_json::to_vec(&payload)
        .map_err(|e| ServiceError::CryptoFailure(format!("response encoding failed: {}", e)))?;
    let (encrypted_data, mac) = decryptor.encrypt_response(&plaintext).map_err(crypto_err)?;
    Ok(PrepareActivationResponse {
        activation_id: activation.activation_id.clone(),
        encrypted_data: BASE64_STANDARD.encode(encrypted_data),
        mac: BASE64_STANDARD.encode(mac),
        activation_status: activation.activation_status,
    })
}

async fn load_master_pair(
    state: &AppState,
    activation: &Activation,
) -> Result<MasterKeyPair, ServiceError> {
    state
        .db
        .get_master_key_pair(activation.master_key_pair_id)
        .await
        .map_err(db_err)?
        .ok_or(ServiceError::NoMasterKeyPair)
}

// ─── Create (init + key exchange fused) ──────────────────────────────────────

/// request for `createActivation`: init parameters plus the sealed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationRequest {
    pub user_id: String,
    pub application_key: String,
    #[serde(default)]
    pub max_failed_attempts: Option<u32>,
    #[serde(default)]
    pub timestamp_activation_expire: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activation_otp: Option<String>,
    #[serde(default)]
    pub activation_otp_validation: Option<OtpValidation>,
    pub ephemeral_public_key: String,
    pub encrypted_data: String,
    pub mac: String,
}

/// create and key-exchange an activation in one call.
///
/// the caller vouches for the user identity, so no activation code is
/// advertised; the record goes straight to `PENDING_COMMIT`.
pub async fn create_activation(
    state: &AppState,
    request: CreateActivationRequest,
) -> Result<PrepareActivationResponse, ServiceError> {
    let version = state
        .db
        .get_application_version_by_key(&request.application_key)
        .await
        .map_err(db_err)?
        .filter(|v| v.supported)
        .ok_or(ServiceError::ActivationExpired)?;

    let init_response = init_activation(
        state,
        InitActivationRequest {
            user_id: request.user_id,
            application_id: version.application_id,
            protocol_version: Some(3),
            max_failed_attempts: request.max_failed_attempts,
            timestamp_activation_expire: request.timestamp_activation_expire,
            activation_otp: request.activation_otp,
            activation_otp_validation: request.activation_otp_validation,
        },
    )
    .await?;

    prepare_activation(
        state,
        PrepareActivationRequest {
            activation_code: init_response.activation_code,
            application_key: request.application_key,
            ephemeral_public_key: request.ephemeral_public_key,
            encrypted_data: request.encrypted_data,
            mac: request.mac,
        },
    )
    .await
}

// ─── Key Exchange (legacy protocol) ──────────────────────────────────────────

/// request for the legacy `prepareActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareActivationLegacyRequest {
    pub activation_id_short: String,
    /// Base64, one AES block; doubles as the transport IV.
    pub activation_nonce: String,
    pub application_key: String,
    /// `HMAC-SHA-256(app_secret, ...)` over the envelope, Base64.
    pub application_signature: String,
    /// client's ephemeral public key, Base64 SEC1. optional for clients that
    /// skip the outer encryption layer.
    #[serde(default)]
    pub ephemeral_public_key: Option<String>,
    /// doubly-encrypted device public key, Base64.
    pub encrypted_device_public_key: String,
    #[serde(default)]
    pub activation_name: Option<String>,
    #[serde(default)]
    pub extras: Option<String>,
}

/// response for the legacy `prepareActivation` / `createActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareActivationLegacyResponse {
    pub activation_id: String,
    /// server-generated nonce for the response transport, Base64.
    pub activation_nonce: String,
    /// doubly-encrypted server public key, Base64.
    pub encrypted_server_public_key: String,
    /// ECDSA signature over the encrypted server key, Base64 DER.
    pub encrypted_server_public_key_signature: String,
    /// server's ephemeral public key, Base64 SEC1.
    pub ephemeral_public_key: String,
}

/// complete the legacy device key exchange for a `CREATED` activation.
pub async fn prepare_activation_legacy(
    state: &AppState,
    request: PrepareActivationLegacyRequest,
) -> Result<PrepareActivationLegacyResponse, ServiceError> {
    let activation_nonce = decode_b64("activationNonce", &request.activation_nonce)?;
    let application_signature = decode_b64("applicationSignature", &request.application_signature)?;
    let c_device_public_key =
        decode_b64("encryptedDevicePublicKey", &request.encrypted_device_public_key)?;
    let client_ephemeral = request
        .ephemeral_public_key
        .as_deref()
        .map(|encoded| {
            let bytes = decode_b64("ephemeralPublicKey", encoded)?;
            keys::public_key_from_bytes(&bytes)
                .map_err(|_| ServiceError::InvalidInput("malformed ephemeral key".to_string()))
        })
        .transpose()?;

    let version = state
        .db
        .get_application_version_by_key(&request.application_key)
        .await
        .map_err(db_err)?
        .filter(|v| v.supported)
        .ok_or(ServiceError::ActivationExpired)?;

    let (txn, record) = state
        .db
        .begin_activation_by_code(
            version.application_id,
            &request.activation_id_short,
            &[ActivationStatus::Created],
        )
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationExpired);
    };

    if activation.is_expired(Utc::now()) {
        return Err(fail_key_exchange(state, txn, &mut activation, "activation_expired").await);
    }

    let master_pair = load_master_pair(state, &activation).await?;
    let master_private = load_master_private_key(&master_pair)?;
    let activation_otp = activation.activation_otp.clone().unwrap_or_default();

    // an undecodable device key removes the record; the legacy surface
    // reported this as a missing activation
    let device_public = match activation_crypto::decrypt_device_public_key_legacy(
        &c_device_public_key,
        &request.activation_id_short,
        &master_private,
        client_ephemeral.as_ref(),
        &activation_otp,
        &activation_nonce,
    ) {
        Ok(key) => key,
        Err(_) => {
            let _ = fail_key_exchange(state, txn, &mut activation, "device_key_invalid").await;
            return Err(ServiceError::ActivationNotFound);
        }
    };

    let signature_valid = activation_crypto::validate_application_signature(
        &request.activation_id_short,
        &activation_nonce,
        &c_device_public_key,
        &version.application_key,
        &version.application_secret,
        &application_signature,
    )
    .map_err(crypto_err)?;
    if !signature_valid {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationExpired);
    }

    activation.device_public_key =
        Some(BASE64_STANDARD.encode(keys::public_key_to_bytes(&device_public)));
    activation.activation_name = request.activation_name.clone();
    activation.extras = request.extras.clone();
    activation.activation_status = ActivationStatus::PendingCommit;

    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(&activation, None, None))
        .await
        .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    // seal the server public key for the response
    let server_nonce = activation_crypto::generate_activation_nonce();
    let (server_ephemeral_private, server_ephemeral_public) = keys::generate_keypair();
    let server_public_bytes = decode_b64("serverPublicKey", &activation.server_public_key)
        .map_err(|_| ServiceError::CryptoFailure("stored server key unreadable".to_string()))?;
    let server_public = keys::public_key_from_bytes(&server_public_bytes).map_err(crypto_err)?;

    let c_server_public_key = activation_crypto::encrypt_server_public_key_legacy(
        &server_public,
        &device_public,
        &server_ephemeral_private,
        &activation_otp,
        &request.activation_id_short,
        &server_nonce,
    )
    .map_err(crypto_err)?;

    // a signing failure falls back to 71 random bytes; legacy clients have
    // never been observed to check this value
    let c_server_public_key_signature = activation_crypto::compute_server_data_signature(
        &activation.activation_id,
        &c_server_public_key,
        &master_private,
    )
    .unwrap_or_else(|_| {
        use rand::RngCore;
        let mut fallback = vec![0u8; 71];
        rand::rng().fill_bytes(&mut fallback);
        fallback
    });

    Ok(PrepareActivationLegacyResponse {
        activation_id: activation.activation_id.clone(),
        activation_nonce: BASE64_STANDARD.encode(server_nonce),
        encrypted_server_public_key: BASE64_STANDARD.encode(c_server_public_key),
        encrypted_server_public_key_signature: BASE64_STANDARD
            .encode(c_server_public_key_signature),
        ephemeral_public_key: BASE64_STANDARD
            .encode(keys::public_key_to_bytes(&server_ephemeral_public)),
    })
}

/// request for the legacy `createActivation`: init parameters plus the sealed
/// device key, fused into one call with a caller-supplied identity and OTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationLegacyRequest {
    pub application_key: String,
    pub user_id: String,
    #[serde(default)]
    pub max_failed_attempts: Option<u32>,
    #[serde(default)]
    pub timestamp_activation_expire: Option<DateTime<Utc>>,
    /// caller-chosen identity string taking the place of the short id.
    pub identity: String,
    pub activation_otp: String,
    pub activation_nonce: String,
    pub application_signature: String,
    #[serde(default)]
    pub ephemeral_public_key: Option<String>,
    pub encrypted_device_public_key: String,
    #[serde(default)]
    pub activation_name: Option<String>,
    #[serde(default)]
    pub extras: Option<String>,
}

/// legacy init + key exchange in one call.
pub async fn create_activation_legacy(
    state: &AppState,
    request: CreateActivationLegacyRequest,
) -> Result<PrepareActivationLegacyResponse, ServiceError> {
    if request.identity.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "identity must not be empty".to_string(),
        ));
    }

    let version = state
        .db
        .get_application_version_by_key(&request.application_key)
        .await
        .map_err(db_err)?
        .filter(|v| v.supported)
        .ok_or(ServiceError::ActivationExpired)?;

    let init_response = init_activation(
        state,
        InitActivationRequest {
            user_id: request.user_id,
            application_id: version.application_id,
            protocol_version: Some(2),
            max_failed_attempts: request.max_failed_attempts,
            timestamp_activation_expire: request.timestamp_activation_expire,
            activation_otp: Some(request.activation_otp.clone()),
            activation_otp_validation: None,
        },
    )
    .await?;

    // rebind the record to the caller-supplied identity; the generated short
    // id was only a placeholder
    let mut activation = state
        .db
        .get_activation(&init_response.activation_id)
        .await
        .map_err(db_err)?
        .ok_or(ServiceError::ActivationNotFound)?;
    activation.activation_code = request.identity.clone();
    state
        .db
        .update_activation(&activation)
        .await
        .map_err(db_err)?;

    prepare_activation_legacy(
        state,
        PrepareActivationLegacyRequest {
            activation_id_short: request.identity,
            activation_nonce: request.activation_nonce,
            application_key: request.application_key,
            application_signature: request.application_signature,
            ephemeral_public_key: request.ephemeral_public_key,
            encrypted_device_public_key: request.encrypted_device_public_key,
            activation_name: request.activation_name,
            extras: request.extras,
        },
    )
    .await
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// request for `commitActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitActivationRequest {
    pub activation_id: String,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub activation_otp: Option<String>,
}

/// response for `commitActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitActivationResponse {
    pub activation_id: String,
    pub activated: bool,
}

/// move a `PENDING_COMMIT` activation to `ACTIVE`.
///
/// idempotent on `ACTIVE`; any other state is an error.
pub async fn commit_activation(
    state: &AppState,
    request: CommitActivationRequest,
) -> Result<CommitActivationResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationNotFound);
    };

    if activation.is_expired(Utc::now()) {
        return Err(fail_key_exchange(state, txn, &mut activation, "activation_expired").await);
    }

    match activation.activation_status {
        // repeated commits succeed without mutation
        ActivationStatus::Active => {
            txn.rollback().await.map_err(db_err)?;
            return Ok(CommitActivationResponse {
                activation_id: request.activation_id,
                activated: true,
            });
        }
        ActivationStatus::PendingCommit => {}
        _ => {
            txn.rollback().await.map_err(db_err)?;
            return Err(ServiceError::InvalidActivationState);
        }
    }

    if activation.activation_otp_validation == OtpValidation::OnCommit
        && !otp_matches(
            activation.activation_otp.as_deref(),
            request.activation_otp.as_deref(),
        )
    {
        return Err(register_otp_failure(state, txn, &mut activation).await);
    }

    activation.activation_status = ActivationStatus::Active;
    activation.failed_attempts = 0;
    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(
        &activation,
        None,
        request.external_user_id.as_deref(),
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    info!(activation_id = %activation.activation_id, "activation committed");

    Ok(CommitActivationResponse {
        activation_id: request.activation_id,
        activated: true,
    })
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// request for `getActivationStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetActivationStatusRequest {
    pub activation_id: String,
}

/// response for `getActivationStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetActivationStatusResponse {
    pub activation_id: String,
    pub activation_status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_name: Option<String>,
    pub user_id: String,
    pub application_id: i64,
    /// present only while the record is `CREATED` and the code is still live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,
    pub failed_attempts: u32,
    pub max_failed_attempts: u32,
    pub remaining_attempts: u32,
    pub version: u32,
    pub activation_flags: Vec<String>,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_activation_expire: DateTime<Utc>,
    pub timestamp_last_used: DateTime<Utc>,
}

/// report the current status of an activation.
///
/// unknown ids yield a synthetic `REMOVED` response so callers cannot probe
/// which ids exist.
pub async fn get_activation_status(
    state: &AppState,
    request: GetActivationStatusRequest,
) -> Result<GetActivationStatusResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        let now = Utc::now();
        return Ok(GetActivationStatusResponse {
            activation_id: request.activation_id,
            activation_status: ActivationStatus::Removed,
            blocked_reason: None,
            activation_name: None,
            user_id: UNKNOWN_USER_ID.to_string(),
            application_id: 0,
            activation_code: None,
            failed_attempts: 0,
            max_failed_attempts: 0,
            remaining_attempts: 0,
            version: 3,
            activation_flags: vec![],
            timestamp_created: now,
            timestamp_activation_expire: now,
            timestamp_last_used: now,
        });
    };

    // lazy expiration on the read path
    if activation.is_expired(Utc::now()) {
        remove_in_txn(&txn, &mut activation, "activation_expired").await?;
        txn.commit().await.map_err(db_err)?;
        notify_status(state, &activation);
    } else {
        txn.rollback().await.map_err(db_err)?;
    }

    Ok(status_response(&activation))
}

fn status_response(activation: &Activation) -> GetActivationStatusResponse {
    GetActivationStatusResponse {
        activation_id: activation.activation_id.clone(),
        activation_status: activation.activation_status,
        blocked_reason: activation.blocked_reason.clone(),
        activation_name: activation.activation_name.clone(),
        user_id: activation.user_id.clone(),
        application_id: activation.application_id,
        activation_code: (activation.activation_status == ActivationStatus::Created)
            .then(|| activation.activation_code.clone()),
        failed_attempts: activation.failed_attempts,
        max_failed_attempts: activation.max_failed_attempts,
        remaining_attempts: activation.remaining_attempts(),
        version: activation.version,
        activation_flags: activation.activation_flags.clone(),
        timestamp_created: activation.timestamp_created,
        timestamp_activation_expire: activation.timestamp_activation_expire,
        timestamp_last_used: activation.timestamp_last_used,
    }
}

// ─── Remove / Block / Unblock ────────────────────────────────────────────────

/// request for `removeActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveActivationRequest {
    pub activation_id: String,
    #[serde(default)]
    pub external_user_id: Option<String>,
}

/// response for `removeActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveActivationResponse {
    pub activation_id: String,
    pub removed: bool,
}

/// move any non-terminal activation to `REMOVED` and tombstone key material.
pub async fn remove_activation(
    state: &AppState,
    request: RemoveActivationRequest,
) -> Result<RemoveActivationResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationNotFound);
    };

    if activation.activation_status == ActivationStatus::Removed {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::InvalidActivationState);
    }

    activation.tombstone();
    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(
        &activation,
        None,
        request.external_user_id.as_deref(),
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    info!(activation_id = %activation.activation_id, "activation removed");

    Ok(RemoveActivationResponse {
        activation_id: request.activation_id,
        removed: true,
    })
}

/// request for `blockActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockActivationRequest {
    pub activation_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub external_user_id: Option<String>,
}

/// response for `blockActivation` / `unblockActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockActivationResponse {
    pub activation_id: String,
    pub activation_status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

/// default reason stored when a block request does not carry one.
pub const BLOCKED_REASON_NOT_SPECIFIED: &str = "NOT_SPECIFIED";

/// block an `ACTIVE` activation.
pub async fn block_activation(
    state: &AppState,
    request: BlockActivationRequest,
) -> Result<BlockActivationResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationNotFound);
    };

    if activation.activation_status != ActivationStatus::Active {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::InvalidActivationState);
    }

    activation.activation_status = ActivationStatus::Blocked;
    activation.blocked_reason = Some(
        request
            .reason
            .clone()
            .unwrap_or_else(|| BLOCKED_REASON_NOT_SPECIFIED.to_string()),
    );
    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(
        &activation,
        activation.blocked_reason.as_deref(),
        request.external_user_id.as_deref(),
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    Ok(BlockActivationResponse {
        activation_id: request.activation_id,
        activation_status: activation.activation_status,
        blocked_reason: activation.blocked_reason,
    })
}

/// request for `unblockActivation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockActivationRequest {
    pub activation_id: String,
    #[serde(default)]
    pub external_user_id: Option<String>,
}

/// unblock a `BLOCKED` activation, resetting the failure budget.
pub async fn unblock_activation(
    state: &AppState,
    request: UnblockActivationRequest,
) -> Result<BlockActivationResponse, ServiceError> {
    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationNotFound);
    };

    if activation.activation_status != ActivationStatus::Blocked {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::InvalidActivationState);
    }

    activation.activation_status = ActivationStatus::Active;
    activation.blocked_reason = None;
    activation.failed_attempts = 0;
    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(
        &activation,
        None,
        request.external_user_id.as_deref(),
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    notify_status(state, &activation);

    Ok(BlockActivationResponse {
        activation_id: request.activation_id,
        activation_status: activation.activation_status,
        blocked_reason: None,
    })
}

// ─── OTP rotation ────────────────────────────────────────────────────────────

/// request for `updateActivationOtp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivationOtpRequest {
    pub activation_id: String,
    pub activation_otp: String,
    #[serde(default)]
    pub external_user_id: Option<String>,
}

/// response for `updateActivationOtp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivationOtpResponse {
    pub activation_id: String,
    pub updated: bool,
}

/// rotate the activation OTP before commit.
///
/// legal only while the record is uncommitted and the frozen validation mode
/// is `ON_COMMIT`.
pub async fn update_activation_otp(
    state: &AppState,
    request: UpdateActivationOtpRequest,
) -> Result<UpdateActivationOtpResponse, ServiceError> {
    if request.activation_otp.is_empty() {
        return Err(ServiceError::InvalidInput(
            "activationOtp must not be empty".to_string(),
        ));
    }

    let (txn, record) = state
        .db
        .begin_activation(&request.activation_id)
        .await
        .map_err(db_err)?;
    let Some(mut activation) = record else {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::ActivationNotFound);
    };

    let uncommitted = matches!(
        activation.activation_status,
        ActivationStatus::Created | ActivationStatus::PendingCommit
    );
    if !uncommitted || activation.activation_otp_validation != OtpValidation::OnCommit {
        txn.rollback().await.map_err(db_err)?;
        return Err(ServiceError::InvalidActivationState);
    }

    activation.activation_otp = Some(request.activation_otp);
    txn.store_activation(&activation).await.map_err(db_err)?;
    txn.append_activation_history(&history_entry(
        &activation,
        Some("activation_otp_updated"),
        request.external_user_id.as_deref(),
    ))
    .await
    .map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;

    Ok(UpdateActivationOtpResponse {
        activation_id: request.activation_id,
        updated: true,
    })
}

// ─── Read-side queries ───────────────────────────────────────────────────────

/// compact activation view for list and lookup responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSummary {
    pub activation_id: String,
    pub activation_status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_name: Option<String>,
    pub user_id: String,
    pub application_id: i64,
    pub version: u32,
    pub activation_flags: Vec<String>,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_last_used: DateTime<Utc>,
}

impl From<&Activation> for ActivationSummary {
    fn from(activation: &Activation) -> Self {
        ActivationSummary {
            activation_id: activation.activation_id.clone(),
            activation_status: activation.activation_status,
            activation_name: activation.activation_name.clone(),
            user_id: activation.user_id.clone(),
            application_id: activation.application_id,
            version: activation.version,
            activation_flags: activation.activation_flags.clone(),
            timestamp_created: activation.timestamp_created,
            timestamp_last_used: activation.timestamp_last_used,
        }
    }
}

/// request for `listActivations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActivationsRequest {
    pub user_id: String,
    #[serde(default)]
    pub application_id: Option<i64>,
}

/// response wrapper for list and lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationListResponse {
    pub activations: Vec<ActivationSummary>,
}

/// list a user's activations.
pub async fn list_activations(
    state: &AppState,
    request: ListActivationsRequest,
) -> Result<ActivationListResponse, ServiceError> {
    let records = state
        .db
        .list_activations_for_user(&request.user_id, request.application_id)
        .await
        .map_err(db_err)?;
    Ok(ActivationListResponse {
        activations: records.iter().map(Into::into).collect(),
    })
}

/// request for `lookupActivations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupActivationsRequest {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub application_ids: Vec<i64>,
    #[serde(default)]
    pub activation_status: Option<ActivationStatus>,
    #[serde(default)]
    pub timestamp_last_used_before: Option<DateTime<Utc>>,
}

/// lookup activations across users and applications.
pub async fn lookup_activations(
    state: &AppState,
    request: LookupActivationsRequest,
) -> Result<ActivationListResponse, ServiceError> {
    let records = state
        .db
        .lookup_activations(
            &request.user_ids,
            &request.application_ids,
            request.activation_status,
            request.timestamp_last_used_before,
        )
        .await
        .map_err(db_err)?;
    Ok(ActivationListResponse {
        activations: records.iter().map(Into::into).collect(),
    })
}

/// request for `getActivationHistory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationHistoryRequest {
    pub activation_id: String,
    #[serde(default)]
    pub timestamp_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp_to: Option<DateTime<Utc>>,
}

/// response for `getActivationHistory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationHistoryResponse {
    pub items: Vec<ActivationHistoryItem>,
}

/// one history entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationHistoryItem {
    pub id: u64,
    pub activation_id: String,
    pub activation_status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    pub timestamp_created: DateTime<Utc>,
}

impl From<ActivationHistoryEntry> for ActivationHistoryItem {
    fn from(entry: ActivationHistoryEntry) -> Self {
        ActivationHistoryItem {
            id: entry.id,
            activation_id: entry.activation_id,
            activation_status: entry.activation_status,
            event_reason: entry.event_reason,
            external_user_id: entry.external_user_id,
            timestamp_created: entry.timestamp_created,
        }
    }
}

/// fetch the lifecycle log of one activation.
pub async fn get_activation_history(
    state: &AppState,
    request: ActivationHistoryRequest,
) -> Result<ActivationHistoryResponse, ServiceError> {
    let entries = state
        .db
        .list_activation_history(
            &request.activation_id,
            request.timestamp_from,
            request.timestamp_to,
        )
        .await
        .map_err(db_err)?;
    Ok(ActivationHistoryResponse {
        items: entries.into_iter().map(Into::into).collect(),
    })
}
