//! application-side entities: applications, versions, master keypairs.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// a registered client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    /// numeric primary key.
    pub id: i64,
    /// human-readable application name.
    pub name: String,
}

/// one released version of an application.
///
/// each version carries its own `application_key` / `application_secret`
/// credential pair, both 16 random bytes stored Base64. clients present the
/// key to identify themselves and the secret enters the signature base string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationVersion {
    /// numeric primary key.
    pub id: i64,
    /// owning application.
    pub application_id: i64,
    /// version label (e.g. "default", "1.4").
    pub name: String,
    /// client credential identifier, Base64 of 16 random bytes. unique.
    pub application_key: String,
    /// client credential secret, Base64 of 16 random bytes.
    pub application_secret: String,
    /// unsupported versions are rejected during activation and verification.
    pub supported: bool,
}

impl ApplicationVersion {
    /// generate a fresh `(application_key, application_secret)` credential pair.
    pub fn generate_credentials() -> (String, String) {
        use rand::RngCore;
        let mut rng = rand::rng();
        let mut key = [0u8; 16];
        let mut secret = [0u8; 16];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut secret);
        (BASE64_STANDARD.encode(key), BASE64_STANDARD.encode(secret))
    }
}

/// application-wide long-term EC keypair.
///
/// only the newest keypair per application signs new activations; older pairs
/// remain valid for records that snapshot them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterKeyPair {
    /// numeric primary key.
    pub id: i64,
    /// owning application.
    pub application_id: i64,
    /// private key, Base64 of the raw scalar.
    pub master_key_private: String,
    /// public key, Base64 of the uncompressed SEC1 point.
    pub master_key_public: String,
    /// creation instant; ordering key for "newest pair wins".
    pub timestamp_created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_credentials_are_distinct() {
        let (key, secret) = ApplicationVersion::generate_credentials();
        assert_ne!(key, secret);
        // 16 bytes encode to 24 Base64 characters
        assert_eq!(key.len(), 24);
        assert_eq!(secret.len(), 24);
    }

    #[test]
    fn test_credentials_decode_to_16_bytes() {
        let (key, secret) = ApplicationVersion::generate_credentials();
        assert_eq!(BASE64_STANDARD.decode(key).unwrap().len(), 16);
        assert_eq!(BASE64_STANDARD.decode(secret).unwrap().len(), 16);
    }
}
