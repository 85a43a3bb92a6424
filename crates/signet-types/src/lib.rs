//! core types for signet - a trust anchor server for mobile multifactor
//! authentication.
//!
//! this crate provides the fundamental data structures used throughout signet:
//! - [`Activation`]: the provisioned binding between a device and the server
//! - [`ActivationCode`]: human-typeable codes that start key exchange
//! - [`ApplicationVersion`] / [`MasterKeyPair`]: per-application credentials
//! - [`Config`]: application configuration

#![warn(missing_docs)]

mod activation;
mod activation_code;
mod application;
mod audit;
mod config;
mod error;
mod signature;

pub use activation::{Activation, ActivationStatus, KeyEncryptionMode, OtpValidation};
pub use activation_code::{
    generate_legacy_otp, ActivationCode, ActivationCodeError, ActivationIdShort, CODE_ALPHABET,
};
pub use application::{Application, ApplicationVersion, MasterKeyPair};
pub use audit::{ActivationHistoryEntry, SignatureAuditEntry, SignatureAuditResult};
pub use config::{
    ActivationConfig, CallbackConfig, Config, DatabaseConfig, SecurityConfig, SignatureConfig,
};
pub use error::ServiceError;
pub use signature::{SignatureFactor, SignatureType};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ServiceError>;
