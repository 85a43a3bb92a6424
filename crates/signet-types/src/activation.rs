//! the activation aggregate - a provisioned binding between a device and the
//! server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// lifecycle status of an activation.
///
/// transitions are driven by the service layer and must not skip states:
/// `CREATED -> PENDING_COMMIT -> ACTIVE -> (BLOCKED | REMOVED)`. `REMOVED` is
/// terminal and reachable from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationStatus {
    /// record exists, device key exchange has not happened yet.
    Created,
    /// device public key is set, waiting for the commit step.
    PendingCommit,
    /// fully provisioned, signatures are accepted.
    Active,
    /// temporarily disabled, signatures are rejected.
    Blocked,
    /// terminal. key material is tombstoned.
    Removed,
}

impl ActivationStatus {
    /// whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivationStatus::Removed)
    }

    /// whether a direct transition to `next` is legal.
    pub fn can_transition_to(&self, next: ActivationStatus) -> bool {
        use ActivationStatus::*;
        match (self, next) {
            (Created, PendingCommit) => true,
            (PendingCommit, Active) => true,
            (Active, Blocked) => true,
            (Blocked, Active) => true,
            (Removed, _) => false,
            (_, Removed) => true,
            _ => false,
        }
    }

    /// database column value for this status.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ActivationStatus::Created => "created",
            ActivationStatus::PendingCommit => "pending_commit",
            ActivationStatus::Active => "active",
            ActivationStatus::Blocked => "blocked",
            ActivationStatus::Removed => "removed",
        }
    }

    /// parse a database column value. unknown values map to `Removed` so that
    /// corrupt rows fail closed.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "created" => ActivationStatus::Created,
            "pending_commit" => ActivationStatus::PendingCommit,
            "active" => ActivationStatus::Active,
            "blocked" => ActivationStatus::Blocked,
            _ => ActivationStatus::Removed,
        }
    }
}

/// when (if ever) the activation OTP is checked during provisioning.
///
/// frozen at init and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpValidation {
    /// no OTP is required.
    #[default]
    None,
    /// the OTP must accompany the device key exchange.
    OnKeyExchange,
    /// the OTP must accompany the commit step.
    OnCommit,
}

impl OtpValidation {
    /// database column value for this mode.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            OtpValidation::None => "none",
            OtpValidation::OnKeyExchange => "on_key_exchange",
            OtpValidation::OnCommit => "on_commit",
        }
    }

    /// parse a database column value.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "on_key_exchange" => OtpValidation::OnKeyExchange,
            "on_commit" => OtpValidation::OnCommit,
            _ => OtpValidation::None,
        }
    }
}

/// how the server private key is protected at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyEncryptionMode {
    /// stored as plain Base64.
    #[default]
    NoEncryption,
    /// AES-128-CBC encrypted and HMAC-authenticated with a key derived from
    /// the server-wide master key and the record identity.
    AesHmac,
}

impl KeyEncryptionMode {
    /// database column value for this mode.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            KeyEncryptionMode::NoEncryption => "no_encryption",
            KeyEncryptionMode::AesHmac => "aes_hmac",
        }
    }

    /// parse a database column value.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "aes_hmac" => KeyEncryptionMode::AesHmac,
            _ => KeyEncryptionMode::NoEncryption,
        }
    }
}

/// an activation record - the aggregate root of the provisioning subsystem.
///
/// one record binds a device keypair to a per-activation server keypair, and
/// carries the monotonically advancing signature counter plus the lockout
/// bookkeeping. all mutation happens through the service layer under a
/// row-level lock; this struct is a plain value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    /// UUIDv4 primary key.
    pub activation_id: String,

    /// activation code (current format) or short activation id (legacy).
    /// unique while the record is in a non-terminal pending state.
    pub activation_code: String,

    /// owning application.
    pub application_id: i64,

    /// opaque user identity. never mutated by client-facing paths.
    pub user_id: String,

    /// master keypair in force when this record was created. the reference is
    /// a snapshot and never follows later rotations.
    pub master_key_pair_id: i64,

    /// server public key, Base64 of the uncompressed SEC1 point.
    pub server_public_key: String,

    /// server private key, Base64. ciphertext when `server_private_key_encryption`
    /// is `AesHmac`.
    pub server_private_key: String,

    /// at-rest protection mode of `server_private_key`.
    pub server_private_key_encryption: KeyEncryptionMode,

    /// device public key, Base64 of the uncompressed SEC1 point.
    /// `None` exactly while the record is `CREATED`.
    pub device_public_key: Option<String>,

    /// client-chosen display name, set during key exchange.
    pub activation_name: Option<String>,

    /// opaque extra attributes supplied by the client during key exchange.
    pub extras: Option<String>,

    /// signature counter. strictly non-decreasing.
    pub counter: u64,

    /// 16-byte hash-chain counter (current protocol only). advances together
    /// with `counter`.
    pub ctr_data: Option<Vec<u8>>,

    /// consecutive failed verification attempts since the last success.
    pub failed_attempts: u32,

    /// lockout threshold. reaching it forces `BLOCKED`.
    pub max_failed_attempts: u32,

    /// lifecycle status.
    pub activation_status: ActivationStatus,

    /// reason recorded when the activation was blocked.
    pub blocked_reason: Option<String>,

    /// activation OTP, when the validation mode requires one.
    pub activation_otp: Option<String>,

    /// when the OTP is validated. frozen at init.
    pub activation_otp_validation: OtpValidation,

    /// protocol generation (2 or 3). frozen at init.
    pub version: u32,

    /// opaque tags attached to this activation.
    pub activation_flags: Vec<String>,

    /// creation instant.
    pub timestamp_created: DateTime<Utc>,

    /// instant after which an uncommitted record can no longer be completed.
    pub timestamp_activation_expire: DateTime<Utc>,

    /// last signature verification attempt.
    pub timestamp_last_used: DateTime<Utc>,
}

impl Activation {
    /// generate a fresh UUIDv4 activation id.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// whether this record sits in a pending state past its expiration window.
    ///
    /// committed records never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.activation_status,
            ActivationStatus::Created | ActivationStatus::PendingCommit
        ) && now > self.timestamp_activation_expire
    }

    /// remaining failed attempts before lockout.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_failed_attempts.saturating_sub(self.failed_attempts)
    }

    /// tombstone the record: drop all key material and move to `REMOVED`.
    ///
    /// key material is never reconstructed afterwards.
    pub fn tombstone(&mut self) {
        self.activation_status = ActivationStatus::Removed;
        self.device_public_key = None;
        self.server_public_key = String::new();
        self.server_private_key = String::new();
        self.ctr_data = None;
        self.activation_otp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ActivationStatus) -> Activation {
        let now = Utc::now();
        Activation {
            activation_id: Activation::generate_id(),
            activation_code: "AAAAA-AAAAA-AAAAA-AAAAA".to_string(),
            application_id: 1,
            user_id: "user-1".to_string(),
            master_key_pair_id: 1,
            server_public_key: "cHVi".to_string(),
            server_private_key: "cHJpdg==".to_string(),
            server_private_key_encryption: KeyEncryptionMode::NoEncryption,
            device_public_key: None,
            activation_name: None,
            extras: None,
            counter: 0,
            ctr_data: None,
            failed_attempts: 0,
            max_failed_attempts: 5,
            activation_status: status,
            blocked_reason: None,
            activation_otp: None,
            activation_otp_validation: OtpValidation::None,
            version: 3,
            activation_flags: vec![],
            timestamp_created: now,
            timestamp_activation_expire: now + chrono::Duration::minutes(5),
            timestamp_last_used: now,
        }
    }

    #[test]
    fn test_status_transitions() {
        use ActivationStatus::*;
        assert!(Created.can_transition_to(PendingCommit));
        assert!(PendingCommit.can_transition_to(Active));
        assert!(Active.can_transition_to(Blocked));
        assert!(Blocked.can_transition_to(Active));
        assert!(Created.can_transition_to(Removed));
        assert!(Active.can_transition_to(Removed));

        // no state skipping
        assert!(!Created.can_transition_to(Active));
        assert!(!PendingCommit.can_transition_to(Blocked));
        // removed is terminal
        assert!(!Removed.can_transition_to(Created));
        assert!(!Removed.can_transition_to(Active));
    }

    #[test]
    fn test_status_db_roundtrip() {
        use ActivationStatus::*;
        for status in [Created, PendingCommit, Active, Blocked, Removed] {
            assert_eq!(ActivationStatus::from_db_str(status.as_db_str()), status);
        }
        // unknown values fail closed
        assert_eq!(ActivationStatus::from_db_str("garbage"), Removed);
    }

    #[test]
    fn test_expiry_only_applies_to_pending_states() {
        let now = Utc::now();
        let mut activation = record(ActivationStatus::Created);
        activation.timestamp_activation_expire = now - chrono::Duration::seconds(1);
        assert!(activation.is_expired(now));

        activation.activation_status = ActivationStatus::PendingCommit;
        assert!(activation.is_expired(now));

        activation.activation_status = ActivationStatus::Active;
        assert!(!activation.is_expired(now));
    }

    #[test]
    fn test_tombstone_clears_key_material() {
        let mut activation = record(ActivationStatus::Active);
        activation.device_public_key = Some("ZGV2".to_string());
        activation.ctr_data = Some(vec![0u8; 16]);
        activation.activation_otp = Some("12345".to_string());

        activation.tombstone();

        assert_eq!(activation.activation_status, ActivationStatus::Removed);
        assert!(activation.device_public_key.is_none());
        assert!(activation.server_public_key.is_empty());
        assert!(activation.server_private_key.is_empty());
        assert!(activation.ctr_data.is_none());
        assert!(activation.activation_otp.is_none());
    }

    #[test]
    fn test_remaining_attempts_saturates() {
        let mut activation = record(ActivationStatus::Active);
        activation.failed_attempts = 5;
        assert_eq!(activation.remaining_attempts(), 0);
        activation.failed_attempts = 7;
        assert_eq!(activation.remaining_attempts(), 0);
        activation.failed_attempts = 2;
        assert_eq!(activation.remaining_attempts(), 3);
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&ActivationStatus::PendingCommit).unwrap();
        assert_eq!(json, "\"PENDING_COMMIT\"");
    }
}
