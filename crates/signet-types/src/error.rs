//! service error taxonomy.

use thiserror::Error;

/// errors surfaced by the service layer.
///
/// the variants deliberately stay coarse: a failed signature is not an error
/// (it is a negative result), and crypto failures on a concrete activation
/// are reported as `ActivationExpired` to the client to avoid oracles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// activation does not exist.
    #[error("activation not found")]
    ActivationNotFound,

    /// application or application version does not exist or is unsupported.
    #[error("application not found")]
    ApplicationNotFound,

    /// activation is past its expiration window, or a condition that must not
    /// be distinguishable from expiry occurred.
    #[error("activation expired")]
    ActivationExpired,

    /// operation is not legal in the activation's current status.
    #[error("operation not allowed in current activation state")]
    InvalidActivationState,

    /// the supplied activation OTP did not match.
    #[error("invalid activation otp")]
    InvalidActivationOtp,

    /// malformed or missing request data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// invalid key material, MAC mismatch or key agreement failure.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),

    /// activation id generation retries exhausted.
    #[error("unable to generate activation id")]
    UnableToGenerateActivationId,

    /// activation code generation retries exhausted.
    #[error("unable to generate activation code")]
    UnableToGenerateActivationCode,

    /// no master keypair is configured for the application.
    #[error("no master key pair configured for application")]
    NoMasterKeyPair,

    /// the server-wide encryption key is missing or malformed.
    #[error("server encryption key missing or invalid")]
    MissingEncryptionKey,

    /// persistence failure.
    #[error("database error: {0}")]
    Database(String),
}

impl ServiceError {
    /// stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ActivationNotFound => "ERR_ACTIVATION_NOT_FOUND",
            ServiceError::ApplicationNotFound => "ERR_APPLICATION_NOT_FOUND",
            ServiceError::ActivationExpired => "ERR_ACTIVATION_EXPIRED",
            ServiceError::InvalidActivationState => "ERR_ACTIVATION_INVALID_STATE",
            ServiceError::InvalidActivationOtp => "ERR_ACTIVATION_OTP_INVALID",
            ServiceError::InvalidInput(_) => "ERR_INVALID_INPUT",
            ServiceError::CryptoFailure(_) => "ERR_CRYPTO_FAILURE",
            ServiceError::UnableToGenerateActivationId => "ERR_GENERATE_ACTIVATION_ID",
            ServiceError::UnableToGenerateActivationCode => "ERR_GENERATE_ACTIVATION_CODE",
            ServiceError::NoMasterKeyPair => "ERR_NO_MASTER_KEYPAIR",
            ServiceError::MissingEncryptionKey => "ERR_ENCRYPTION_KEY",
            ServiceError::Database(_) => "ERR_DATABASE",
        }
    }

    /// whether the error is the caller's fault (4xx) rather than the server's.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ServiceError::Database(_)
                | ServiceError::NoMasterKeyPair
                | ServiceError::MissingEncryptionKey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            ServiceError::ActivationExpired.code(),
            "ERR_ACTIVATION_EXPIRED"
        );
        assert_eq!(
            ServiceError::InvalidActivationState.code(),
            "ERR_ACTIVATION_INVALID_STATE"
        );
    }

    #[test]
    fn test_server_side_errors_are_not_client_errors() {
        assert!(!ServiceError::Database("boom".into()).is_client_error());
        assert!(!ServiceError::NoMasterKeyPair.is_client_error());
        assert!(ServiceError::ActivationNotFound.is_client_error());
        assert!(ServiceError::InvalidInput("x".into()).is_client_error());
    }
}
