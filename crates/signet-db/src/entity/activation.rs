//! activation entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use tracing::warn;

use signet_types::{Activation, ActivationStatus, KeyEncryptionMode, OtpValidation};

/// activation database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activations")]
pub struct Model {
    /// UUIDv4 primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub activation_id: String,

    /// activation code or legacy short id
    pub activation_code: String,

    pub application_id: i64,
    pub user_id: String,
    pub master_key_pair_id: i64,

    /// base64 uncompressed SEC1 point
    #[sea_orm(column_type = "Text")]
    pub server_public_key: String,

    /// base64, ciphertext when encryption mode is aes_hmac
    #[sea_orm(column_type = "Text")]
    pub server_private_key: String,

    /// keyencryptionmode as string
    pub server_private_key_encryption: String,

    /// base64 uncompressed SEC1 point, null until key exchange
    #[sea_orm(column_type = "Text", nullable)]
    pub device_public_key: Option<String>,

    pub activation_name: Option<String>,
    pub extras: Option<String>,

    pub counter: i64,

    /// 16-byte hash-chain counter (current protocol only)
    #[sea_orm(column_type = "VarBinary(StringLen::None)", nullable)]
    pub ctr_data: Option<Vec<u8>>,

    pub failed_attempts: i64,
    pub max_failed_attempts: i64,

    /// activationstatus as string
    pub activation_status: String,
    pub blocked_reason: Option<String>,

    pub activation_otp: Option<String>,
    /// otpvalidation as string
    pub activation_otp_validation: String,

    /// protocol generation (2 or 3)
    pub version: i32,

    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub activation_flags: String,

    pub timestamp_created: DateTime<Utc>,
    pub timestamp_activation_expire: DateTime<Utc>,
    pub timestamp_last_used: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
    #[sea_orm(
        belongs_to = "super::master_key_pair::Entity",
        from = "Column::MasterKeyPairId",
        to = "super::master_key_pair::Column::Id"
    )]
    MasterKeyPair,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl Related<super::master_key_pair::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MasterKeyPair.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Activation {
    fn from(model: Model) -> Self {
        let activation_flags: Vec<String> = match serde_json::from_str(&model.activation_flags) {
            Ok(v) => v,
            Err(e) => {
                warn!(activation_id = %model.activation_id, error = %e, "failed to parse activation flags JSON, using empty list");
                Vec::new()
            }
        };

        Activation {
            activation_id: model.activation_id,
            activation_code: model.activation_code,
            application_id: model.application_id,
            user_id: model.user_id,
            master_key_pair_id: model.master_key_pair_id,
            server_public_key: model.server_public_key,
            server_private_key: model.server_private_key,
            server_private_key_encryption: KeyEncryptionMode::from_db_str(
                &model.server_private_key_encryption,
            ),
            device_public_key: model.device_public_key,
            activation_name: model.activation_name,
            extras: model.extras,
            counter: model.counter as u64,
            ctr_data: model.ctr_data,
            failed_attempts: model.failed_attempts as u32,
            max_failed_attempts: model.max_failed_attempts as u32,
            activation_status: ActivationStatus::from_db_str(&model.activation_status),
            blocked_reason: model.blocked_reason,
            activation_otp: model.activation_otp,
            activation_otp_validation: OtpValidation::from_db_str(
                &model.activation_otp_validation,
            ),
            version: model.version as u32,
            activation_flags,
            timestamp_created: model.timestamp_created,
            timestamp_activation_expire: model.timestamp_activation_expire,
            timestamp_last_used: model.timestamp_last_used,
        }
    }
}

impl From<&Activation> for ActiveModel {
    fn from(activation: &Activation) -> Self {
        let flags_json =
            serde_json::to_string(&activation.activation_flags).unwrap_or_else(|_| "[]".to_string());

        ActiveModel {
            activation_id: Set(activation.activation_id.clone()),
            activation_code: Set(activation.activation_code.clone()),
            application_id: Set(activation.application_id),
            user_id: Set(activation.user_id.clone()),
            master_key_pair_id: Set(activation.master_key_pair_id),
            server_public_key: Set(activation.server_public_key.clone()),
            server_private_key: Set(activation.server_private_key.clone()),
            server_private_key_encryption: Set(activation
                .server_private_key_encryption
                .as_db_str()
                .to_string()),
            device_public_key: Set(activation.device_public_key.clone()),
            activation_name: Set(activation.activation_name.clone()),
            extras: Set(activation.extras.clone()),
            counter: Set(activation.counter as i64),
            ctr_data: Set(activation.ctr_data.clone()),
            failed_attempts: Set(activation.failed_attempts as i64),
            max_failed_attempts: Set(activation.max_failed_attempts as i64),
            activation_status: Set(activation.activation_status.as_db_str().to_string()),
            blocked_reason: Set(activation.blocked_reason.clone()),
            activation_otp: Set(activation.activation_otp.clone()),
            activation_otp_validation: Set(activation
                .activation_otp_validation
                .as_db_str()
                .to_string()),
            version: Set(activation.version as i32),
            activation_flags: Set(flags_json),
            timestamp_created: Set(activation.timestamp_created),
            timestamp_activation_expire: Set(activation.timestamp_activation_expire),
            timestamp_last_used: Set(activation.timestamp_last_used),
        }
    }
}
