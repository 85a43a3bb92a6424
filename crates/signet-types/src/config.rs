//! configuration types for signet.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::activation::KeyEncryptionMode;

/// main configuration for signet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// address to bind the http server to.
    pub listen_addr: String,

    /// database configuration.
    pub database: DatabaseConfig,

    /// activation provisioning options.
    pub activation: ActivationConfig,

    /// signature verification options.
    pub signature: SignatureConfig,

    /// key protection and access options.
    pub security: SecurityConfig,

    /// outbound callback options.
    pub callback: CallbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database: DatabaseConfig::default(),
            activation: ActivationConfig::default(),
            signature: SignatureConfig::default(),
            security: SecurityConfig::default(),
            callback: CallbackConfig::default(),
        }
    }
}

/// database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "/var/lib/signet/db.sqlite".to_string(),
        }
    }
}

/// activation provisioning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// how long an uncommitted activation stays completable, in milliseconds.
    ///
    /// the short window bounds the period in which a leaked activation code
    /// can be used to finish key exchange.
    pub validity_ms: u64,

    /// how many times to retry activation id generation on collision.
    pub id_generation_iterations: u32,

    /// how many times to retry activation code generation on collision.
    pub code_generation_iterations: u32,

    /// how often the expiration sweep runs, in seconds. 0 disables the sweep.
    pub sweep_interval_secs: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            validity_ms: 300_000,
            id_generation_iterations: 10,
            code_generation_iterations: 10,
            sweep_interval_secs: 60,
        }
    }
}

/// signature verification options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// failed attempts tolerated before an activation is blocked.
    pub max_failed_attempts: u32,

    /// how many future counter values are accepted as signed.
    pub validation_lookahead: u32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            validation_lookahead: 20,
        }
    }
}

/// key protection and access options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// whether administrative callers must be explicitly granted access.
    pub restrict_access: bool,

    /// at-rest protection for per-activation server private keys.
    pub server_private_key_encryption: KeyEncryptionMode,

    /// server-wide encryption key, Base64 of 16 bytes. required when
    /// `server_private_key_encryption` is `AES_HMAC`. loaded once at startup
    /// and never written back out.
    #[serde(skip_serializing)]
    pub master_db_encryption_key: Option<SecretString>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            restrict_access: false,
            server_private_key_encryption: KeyEncryptionMode::NoEncryption,
            master_db_encryption_key: None,
        }
    }
}

/// outbound callback options.
///
/// per-application callback routing lives outside this core; a single webhook
/// url covers the deployment when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// webhook url to POST status change events to. `None` disables delivery.
    pub url: Option<String>,

    /// delivery attempts per event before the event is dropped and logged.
    pub max_attempts: u32,

    /// backoff between delivery attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.activation.validity_ms, 300_000);
        assert_eq!(config.activation.id_generation_iterations, 10);
        assert_eq!(config.activation.code_generation_iterations, 10);
        assert_eq!(config.activation.sweep_interval_secs, 60);
        assert_eq!(config.signature.max_failed_attempts, 5);
        assert_eq!(config.signature.validation_lookahead, 20);
        assert!(!config.security.restrict_access);
        assert_eq!(
            config.security.server_private_key_encryption,
            KeyEncryptionMode::NoEncryption
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "signature": { "max_failed_attempts": 3 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.signature.max_failed_attempts, 3);
        // untouched sections keep defaults
        assert_eq!(config.signature.validation_lookahead, 20);
        assert_eq!(config.activation.validity_ms, 300_000);
    }

    #[test]
    fn test_master_key_not_serialized_in_debug() {
        let json = r#"{ "security": { "master_db_encryption_key": "AAECAwQFBgcICQoLDA0ODw==" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let debug = format!("{:?}", config.security);
        assert!(!debug.contains("AAECAwQFBgcICQoLDA0ODw=="));
    }
}
