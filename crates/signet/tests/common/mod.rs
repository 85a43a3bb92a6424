//! shared test harness: seeded state plus a client-side crypto double.

// not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;

use base64::prelude::*;
use chrono::Utc;
use p256::{PublicKey, SecretKey};

use signet::callback::NullCallbackSink;
use signet::ops::activation::{
    commit_activation, init_activation, prepare_activation, CommitActivationRequest,
    InitActivationRequest, PrepareActivationRequest,
};
use signet::AppState;
use signet_crypto::activation::ACTIVATION_SHARED_INFO;
use signet_crypto::ecies::EciesEncryptor;
use signet_crypto::kdf::{derive_master_secret, derive_signature_keys, SignatureKeys};
use signet_crypto::keys;
use signet_crypto::signature::{
    compute_signature, next_ctr_data, signature_base, CTR_DATA_LEN,
};
use signet_db::{Database, SignetDb};
use signet_types::{
    Application, ApplicationVersion, Config, MasterKeyPair, SignatureType,
};

/// a seeded application with its credentials and master keys.
pub struct TestApplication {
    pub application_id: i64,
    pub application_key: String,
    pub application_secret: String,
    pub master_public: PublicKey,
}

/// build an app state over an in-memory database with a seeded application.
pub async fn setup(config: Config) -> (AppState, TestApplication) {
    let db = SignetDb::new_in_memory().await.unwrap();

    let application = db
        .create_application(&Application {
            id: 0,
            name: "test-app".to_string(),
        })
        .await
        .unwrap();

    let (application_key, application_secret) = ApplicationVersion::generate_credentials();
    db.create_application_version(&ApplicationVersion {
        id: 0,
        application_id: application.id,
        name: "default".to_string(),
        application_key: application_key.clone(),
        application_secret: application_secret.clone(),
        supported: true,
    })
    .await
    .unwrap();

    let (master_private, master_public) = keys::generate_keypair();
    db.create_master_key_pair(&MasterKeyPair {
        id: 0,
        application_id: application.id,
        master_key_private: BASE64_STANDARD.encode(keys::private_key_to_bytes(&master_private)),
        master_key_public: BASE64_STANDARD.encode(keys::public_key_to_bytes(&master_public)),
        timestamp_created: Utc::now(),
    })
    .await
    .unwrap();

    let state = AppState::new(db, config, Arc::new(NullCallbackSink)).unwrap();
    (
        state,
        TestApplication {
            application_id: application.id,
            application_key,
            application_secret,
            master_public,
        },
    )
}

/// shared info binding the key exchange envelope to the app credential,
/// mirroring what the server derives.
pub fn exchange_shared_info(application_secret: &str) -> Vec<u8> {
    let mut info = ACTIVATION_SHARED_INFO.to_vec();
    info.push(b'&');
    info.extend_from_slice(application_secret.as_bytes());
    info
}

/// client-side view of one activated device.
pub struct TestDevice {
    pub activation_id: String,
    pub device_private: SecretKey,
    pub server_public: PublicKey,
    pub ctr_data: [u8; CTR_DATA_LEN],
    factor_keys: SignatureKeys,
    application_secret: String,
}

impl TestDevice {
    /// compute the signature for `data` at the device's current counter and
    /// advance the local hash chain, like a real client does after signing.
    pub fn sign(&mut self, data: &str, signature_type: SignatureType) -> String {
        let signature = self.sign_without_advancing(data, signature_type);
        self.advance();
        signature
    }

    /// compute a signature without moving the local counter. used to model
    /// retries of the same request.
    pub fn sign_without_advancing(&self, data: &str, signature_type: SignatureType) -> String {
        let base = signature_base(data.as_bytes(), &self.ctr_data, &self.application_secret);
        compute_signature(&self.factor_keys, signature_type, &base).unwrap()
    }

    /// advance the local hash chain by one step.
    pub fn advance(&mut self) {
        self.ctr_data = next_ctr_data(&self.ctr_data);
    }
}

/// payload decrypted from the prepare response.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponsePayload {
    activation_id: String,
    server_public_key: String,
    ctr_data: String,
}

/// run init for a user, returning the id/code pair the user would transcribe.
pub async fn init_for_user(
    state: &AppState,
    app: &TestApplication,
    user_id: &str,
) -> signet::ops::activation::InitActivationResponse {
    init_activation(
        state,
        InitActivationRequest {
            user_id: user_id.to_string(),
            application_id: app.application_id,
            protocol_version: None,
            max_failed_attempts: None,
            timestamp_activation_expire: None,
            activation_otp: None,
            activation_otp_validation: None,
        },
    )
    .await
    .unwrap()
}

/// run the full client side of the key exchange for an already-initialized
/// activation, without committing it.
pub async fn exchange_keys(
    state: &AppState,
    app: &TestApplication,
    activation_code: &str,
    activation_otp: Option<&str>,
) -> TestDevice {
    let (device_private, device_public) = keys::generate_keypair();
    let shared_info = exchange_shared_info(&app.application_secret);
    let encryptor = EciesEncryptor::new(&app.master_public, &shared_info);

    let mut payload = serde_json::json!({
        "devicePublicKey": BASE64_STANDARD.encode(keys::public_key_to_bytes(&device_public)),
        "activationName": "test device",
    });
    if let Some(otp) = activation_otp {
        payload["activationOtp"] = serde_json::Value::String(otp.to_string());
    }
    let envelope = encryptor
        .encrypt(&serde_json::to_vec(&payload).unwrap())
        .unwrap();

    let response = prepare_activation(
        state,
        PrepareActivationRequest {
            activation_code: activation_code.to_string(),
            application_key: app.application_key.clone(),
            ephemeral_public_key: BASE64_STANDARD.encode(&envelope.ephemeral_public_key),
            encrypted_data: BASE64_STANDARD.encode(&envelope.encrypted_data),
            mac: BASE64_STANDARD.encode(&envelope.mac),
        },
    )
    .await
    .unwrap();

    let plaintext = encryptor
        .decrypt_response(
            &BASE64_STANDARD.decode(&response.encrypted_data).unwrap(),
            &BASE64_STANDARD.decode(&response.mac).unwrap(),
        )
        .unwrap();
    let payload: ExchangeResponsePayload = serde_json::from_slice(&plaintext).unwrap();

    let server_public = keys::public_key_from_bytes(
        &BASE64_STANDARD.decode(&payload.server_public_key).unwrap(),
    )
    .unwrap();
    let ctr_data_vec = BASE64_STANDARD.decode(&payload.ctr_data).unwrap();
    let mut ctr_data = [0u8; CTR_DATA_LEN];
    ctr_data.copy_from_slice(&ctr_data_vec);

    let shared = keys::shared_secret(&device_private, &server_public);
    let master_secret = derive_master_secret(&shared).unwrap();
    let factor_keys = derive_signature_keys(&master_secret).unwrap();

    TestDevice {
        activation_id: payload.activation_id,
        device_private,
        server_public,
        ctr_data,
        factor_keys,
        application_secret: app.application_secret.clone(),
    }
}

/// full provisioning: init, key exchange and commit.
pub async fn activate_device(
    state: &AppState,
    app: &TestApplication,
    user_id: &str,
) -> TestDevice {
    let init = init_for_user(state, app, user_id).await;
    let device = exchange_keys(state, app, &init.activation_code, None).await;
    commit_activation(
        state,
        CommitActivationRequest {
            activation_id: device.activation_id.clone(),
            external_user_id: None,
            activation_otp: None,
        },
    )
    .await
    .unwrap();
    device
}
