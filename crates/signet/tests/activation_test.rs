//! tests for the activation lifecycle: provisioning, expiration, OTP
//! handling and administrative transitions.

mod common;

use chrono::{Duration, Utc};

use signet::ops::activation::{
    block_activation, commit_activation, get_activation_history, get_activation_status,
    init_activation, remove_activation, unblock_activation, update_activation_otp,
    ActivationHistoryRequest, BlockActivationRequest, CommitActivationRequest,
    GetActivationStatusRequest, InitActivationRequest, RemoveActivationRequest,
    UnblockActivationRequest, UpdateActivationOtpRequest,
};
use signet_db::Database;
use signet_types::{ActivationStatus, Config, OtpValidation, ServiceError};

use common::{activate_device, exchange_keys, init_for_user, setup};

#[tokio::test]
async fn test_happy_path_provisioning() {
    let (state, app) = setup(Config::default()).await;

    let init = init_for_user(&state, &app, "alice").await;
    assert_eq!(init.activation_code.len(), 23); // 4 groups of 5 plus dashes

    // record starts in CREATED with no device key
    let record = state.db.get_activation(&init.activation_id).await.unwrap().unwrap();
    assert_eq!(record.activation_status, ActivationStatus::Created);
    assert!(record.device_public_key.is_none());
    assert!(record.ctr_data.is_none());

    let device = exchange_keys(&state, &app, &init.activation_code, None).await;
    assert_eq!(device.activation_id, init.activation_id);

    // key exchange fixes the device key and seeds the hash chain
    let record = state.db.get_activation(&init.activation_id).await.unwrap().unwrap();
    assert_eq!(record.activation_status, ActivationStatus::PendingCommit);
    assert!(record.device_public_key.is_some());
    assert_eq!(record.ctr_data.as_ref().unwrap().len(), 16);

    commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: init.activation_id.clone(),
            external_user_id: None,
            activation_otp: None,
        },
    )
    .await
    .unwrap();

    let status = get_activation_status(
        &state,
        GetActivationStatusRequest {
            activation_id: init.activation_id.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(status.activation_status, ActivationStatus::Active);
    assert_eq!(status.user_id, "alice");

    // the lifecycle log has one entry per transition, in order
    let history = get_activation_history(
        &state,
        ActivationHistoryRequest {
            activation_id: init.activation_id,
            timestamp_from: None,
            timestamp_to: None,
        },
    )
    .await
    .unwrap();
    let statuses: Vec<ActivationStatus> =
        history.items.iter().map(|i| i.activation_status).collect();
    assert_eq!(
        statuses,
        vec![
            ActivationStatus::Created,
            ActivationStatus::PendingCommit,
            ActivationStatus::Active
        ]
    );
}

#[tokio::test]
async fn test_activation_codes_are_unique_while_pending() {
    let (state, app) = setup(Config::default()).await;

    let first = init_for_user(&state, &app, "alice").await;
    let second = init_for_user(&state, &app, "bob").await;
    assert_ne!(first.activation_code, second.activation_code);
    assert_ne!(first.activation_id, second.activation_id);
}

#[tokio::test]
async fn test_commit_is_idempotent_on_active() {
    let (state, app) = setup(Config::default()).await;
    let device = activate_device(&state, &app, "alice").await;

    // second commit succeeds without mutation
    let response = commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: None,
        },
    )
    .await
    .unwrap();
    assert!(response.activated);

    // still exactly one ACTIVE history entry
    let history = get_activation_history(
        &state,
        ActivationHistoryRequest {
            activation_id: device.activation_id,
            timestamp_from: None,
            timestamp_to: None,
        },
    )
    .await
    .unwrap();
    let active_entries = history
        .items
        .iter()
        .filter(|i| i.activation_status == ActivationStatus::Active)
        .count();
    assert_eq!(active_entries, 1);
}

#[tokio::test]
async fn test_commit_rejected_outside_pending_commit() {
    let (state, app) = setup(Config::default()).await;
    let init = init_for_user(&state, &app, "alice").await;

    // CREATED: key exchange has not happened yet
    let err = commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: init.activation_id,
            external_user_id: None,
            activation_otp: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationState);
}

#[tokio::test]
async fn test_expired_activation_is_removed_on_prepare() {
    let (state, app) = setup(Config::default()).await;

    let init = init_activation(
        &state,
        InitActivationRequest {
            user_id: "alice".to_string(),
            application_id: app.application_id,
            protocol_version: None,
            max_failed_attempts: None,
            timestamp_activation_expire: Some(Utc::now() + Duration::seconds(1)),
            activation_otp: None,
            activation_otp_validation: None,
        },
    )
    .await
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // key exchange after the window reports expiry...
    use base64::prelude::*;
    let (_, device_public) = signet_crypto::keys::generate_keypair();
    let shared_info = common::exchange_shared_info(&app.application_secret);
    let encryptor = signet_crypto::ecies::EciesEncryptor::new(&app.master_public, &shared_info);
    let payload = serde_json::json!({
        "devicePublicKey":
            BASE64_STANDARD.encode(signet_crypto::keys::public_key_to_bytes(&device_public)),
    });
    let envelope = encryptor
        .encrypt(&serde_json::to_vec(&payload).unwrap())
        .unwrap();
    let err = signet::ops::activation::prepare_activation(
        &state,
        signet::ops::activation::PrepareActivationRequest {
            activation_code: init.activation_code.clone(),
            application_key: app.application_key.clone(),
            ephemeral_public_key: BASE64_STANDARD.encode(&envelope.ephemeral_public_key),
            encrypted_data: BASE64_STANDARD.encode(&envelope.encrypted_data),
            mac: BASE64_STANDARD.encode(&envelope.mac),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::ActivationExpired);

    // ...and the record is gone for good
    let status = get_activation_status(
        &state,
        GetActivationStatusRequest {
            activation_id: init.activation_id,
        },
    )
    .await
    .unwrap();
    assert_eq!(status.activation_status, ActivationStatus::Removed);
}

#[tokio::test]
async fn test_otp_on_commit() {
    let (state, app) = setup(Config::default()).await;

    let init = init_activation(
        &state,
        InitActivationRequest {
            user_id: "alice".to_string(),
            application_id: app.application_id,
            protocol_version: None,
            max_failed_attempts: None,
            timestamp_activation_expire: None,
            activation_otp: Some("12345".to_string()),
            activation_otp_validation: Some(OtpValidation::OnCommit),
        },
    )
    .await
    .unwrap();

    let device = exchange_keys(&state, &app, &init.activation_code, None).await;

    // wrong otp fails and burns an attempt
    let err = commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: Some("54321".to_string()),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationOtp);

    let record = state
        .db
        .get_activation(&device.activation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.activation_status, ActivationStatus::PendingCommit);

    // right otp succeeds and clears the budget
    commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: Some("12345".to_string()),
        },
    )
    .await
    .unwrap();

    let record = state
        .db
        .get_activation(&device.activation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.activation_status, ActivationStatus::Active);
    assert_eq!(record.failed_attempts, 0);
}

#[tokio::test]
async fn test_otp_exhaustion_removes_uncommitted_record() {
    let mut config = Config::default();
    config.signature.max_failed_attempts = 2;
    let (state, app) = setup(config).await;

    let init = init_activation(
        &state,
        InitActivationRequest {
            user_id: "alice".to_string(),
            application_id: app.application_id,
            protocol_version: None,
            max_failed_attempts: None,
            timestamp_activation_expire: None,
            activation_otp: Some("12345".to_string()),
            activation_otp_validation: Some(OtpValidation::OnCommit),
        },
    )
    .await
    .unwrap();
    let device = exchange_keys(&state, &app, &init.activation_code, None).await;

    for _ in 0..2 {
        let err = commit_activation(
            &state,
            CommitActivationRequest {
                activation_id: device.activation_id.clone(),
                external_user_id: None,
                activation_otp: Some("00000".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, ServiceError::InvalidActivationOtp);
    }

    let record = state
        .db
        .get_activation(&device.activation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.activation_status, ActivationStatus::Removed);
    assert!(record.device_public_key.is_none());
}

#[tokio::test]
async fn test_update_otp_only_before_commit_in_on_commit_mode() {
    let (state, app) = setup(Config::default()).await;

    let init = init_activation(
        &state,
        InitActivationRequest {
            user_id: "alice".to_string(),
            application_id: app.application_id,
            protocol_version: None,
            max_failed_attempts: None,
            timestamp_activation_expire: None,
            activation_otp: Some("12345".to_string()),
            activation_otp_validation: Some(OtpValidation::OnCommit),
        },
    )
    .await
    .unwrap();
    let device = exchange_keys(&state, &app, &init.activation_code, None).await;

    // rotation is allowed pre-commit
    update_activation_otp(
        &state,
        UpdateActivationOtpRequest {
            activation_id: device.activation_id.clone(),
            activation_otp: "99999".to_string(),
            external_user_id: Some("admin".to_string()),
        },
    )
    .await
    .unwrap();

    // the old otp no longer commits
    let err = commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: Some("12345".to_string()),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationOtp);

    commit_activation(
        &state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: Some("99999".to_string()),
        },
    )
    .await
    .unwrap();

    // once ACTIVE, rotation is illegal
    let err = update_activation_otp(
        &state,
        UpdateActivationOtpRequest {
            activation_id: device.activation_id,
            activation_otp: "11111".to_string(),
            external_user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationState);
}

#[tokio::test]
async fn test_update_otp_rejected_without_on_commit_mode() {
    let (state, app) = setup(Config::default()).await;
    let init = init_for_user(&state, &app, "alice").await;
    let device = exchange_keys(&state, &app, &init.activation_code, None).await;

    let err = update_activation_otp(
        &state,
        UpdateActivationOtpRequest {
            activation_id: device.activation_id,
            activation_otp: "12345".to_string(),
            external_user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationState);
}

#[tokio::test]
async fn test_block_and_unblock() {
    let (state, app) = setup(Config::default()).await;
    let device = activate_device(&state, &app, "alice").await;

    let blocked = block_activation(
        &state,
        BlockActivationRequest {
            activation_id: device.activation_id.clone(),
            reason: Some("lost device".to_string()),
            external_user_id: Some("admin".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(blocked.activation_status, ActivationStatus::Blocked);
    assert_eq!(blocked.blocked_reason.as_deref(), Some("lost device"));

    // blocking twice is an error
    let err = block_activation(
        &state,
        BlockActivationRequest {
            activation_id: device.activation_id.clone(),
            reason: None,
            external_user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationState);

    let unblocked = unblock_activation(
        &state,
        UnblockActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(unblocked.activation_status, ActivationStatus::Active);

    let record = state
        .db
        .get_activation(&device.activation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.failed_attempts, 0);
    assert!(record.blocked_reason.is_none());
}

#[tokio::test]
async fn test_remove_tombstones_key_material() {
    let (state, app) = setup(Config::default()).await;
    let device = activate_device(&state, &app, "alice").await;

    remove_activation(
        &state,
        RemoveActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: Some("admin".to_string()),
        },
    )
    .await
    .unwrap();

    let record = state
        .db
        .get_activation(&device.activation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.activation_status, ActivationStatus::Removed);
    assert!(record.device_public_key.is_none());
    assert!(record.server_public_key.is_empty());
    assert!(record.server_private_key.is_empty());
    assert!(record.ctr_data.is_none());

    // status keeps reporting REMOVED
    let status = get_activation_status(
        &state,
        GetActivationStatusRequest {
            activation_id: device.activation_id.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(status.activation_status, ActivationStatus::Removed);

    // removing again is an error
    let err = remove_activation(
        &state,
        RemoveActivationRequest {
            activation_id: device.activation_id,
            external_user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::InvalidActivationState);
}

#[tokio::test]
async fn test_status_for_unknown_activation_reports_removed() {
    let (state, _) = setup(Config::default()).await;

    let status = get_activation_status(
        &state,
        GetActivationStatusRequest {
            activation_id: "00000000-0000-4000-8000-000000000000".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(status.activation_status, ActivationStatus::Removed);
    assert_eq!(status.user_id, "UNKNOWN");
}
