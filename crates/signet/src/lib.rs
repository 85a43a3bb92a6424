//! signet library - service operations, HTTP handlers and application setup.

pub mod callback;
pub mod cli;
pub mod handlers;
pub mod ops;
pub mod sweep;

use std::sync::Arc;

use axum::{routing::post, Router};
use base64::prelude::*;
use secrecy::ExposeSecret;

use signet_db::SignetDb;
use signet_types::{Config, KeyEncryptionMode, ServiceError};

use callback::CallbackSink;

/// application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// database handle.
    pub db: SignetDb,
    /// server configuration.
    pub config: Config,
    /// sink for activation status change notifications.
    pub callbacks: Arc<dyn CallbackSink>,
    /// server-wide key protecting server private keys at rest, decoded once
    /// at startup.
    master_db_key: Option<Arc<Vec<u8>>>,
}

impl AppState {
    /// build the application state, decoding and validating the master
    /// encryption key against the configured at-rest protection mode.
    pub fn new(
        db: SignetDb,
        config: Config,
        callbacks: Arc<dyn CallbackSink>,
    ) -> Result<Self, ServiceError> {
        let master_db_key = match &config.security.master_db_encryption_key {
            Some(secret) => {
                let decoded = BASE64_STANDARD
                    .decode(secret.expose_secret())
                    .map_err(|_| ServiceError::MissingEncryptionKey)?;
                if decoded.len() != 16 {
                    return Err(ServiceError::MissingEncryptionKey);
                }
                Some(Arc::new(decoded))
            }
            None => None,
        };

        if config.security.server_private_key_encryption == KeyEncryptionMode::AesHmac
            && master_db_key.is_none()
        {
            return Err(ServiceError::MissingEncryptionKey);
        }

        Ok(Self {
            db,
            config,
            callbacks,
            master_db_key,
        })
    }

    /// the decoded master encryption key, required in `AES_HMAC` mode.
    pub(crate) fn master_db_key(&self) -> Result<&[u8], ServiceError> {
        self.master_db_key
            .as_deref()
            .map(Vec::as_slice)
            .ok_or(ServiceError::MissingEncryptionKey)
    }
}

/// create the axum application with all routes.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // current protocol
        .route("/v3/activation/init", post(handlers::activation::init))
        .route("/v3/activation/prepare", post(handlers::activation::prepare))
        .route("/v3/activation/create", post(handlers::activation::create))
        .route("/v3/activation/commit", post(handlers::activation::commit))
        .route("/v3/activation/status", post(handlers::activation::status))
        .route("/v3/activation/remove", post(handlers::activation::remove))
        .route("/v3/activation/block", post(handlers::activation::block))
        .route("/v3/activation/unblock", post(handlers::activation::unblock))
        .route(
            "/v3/activation/otp/update",
            post(handlers::activation::update_otp),
        )
        .route("/v3/activation/list", post(handlers::activation::list))
        .route("/v3/activation/lookup", post(handlers::activation::lookup))
        .route("/v3/activation/history", post(handlers::activation::history))
        .route("/v3/signature/verify", post(handlers::signature::verify))
        .route(
            "/v3/signature/ecdsa/verify",
            post(handlers::signature::verify_ecdsa),
        )
        .route("/v3/vault/unlock", post(handlers::vault::unlock))
        // legacy protocol
        .route(
            "/v2/activation/prepare",
            post(handlers::activation::prepare_legacy),
        )
        .route(
            "/v2/activation/create",
            post(handlers::activation::create_legacy),
        )
        .with_state(state)
}
