//! signature audit entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use signet_types::{SignatureAuditEntry, SignatureAuditResult, SignatureType};

/// signature audit database model. append-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "signature_audit")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activation_id: String,
    pub application_id: i64,
    pub user_id: String,
    /// signaturetype as string
    pub signature_type: String,
    /// hex sha-256 of the signed data
    pub data_fingerprint: String,
    /// "ok" or "failed"
    pub result: String,
    pub note: Option<String>,
    /// counter value when the attempt was evaluated
    pub counter: i64,
    pub timestamp_created: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activation::Entity",
        from = "Column::ActivationId",
        to = "super::activation::Column::ActivationId"
    )]
    Activation,
}

impl Related<super::activation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SignatureAuditEntry {
    fn from(model: Model) -> Self {
        SignatureAuditEntry {
            id: model.id as u64,
            activation_id: model.activation_id,
            application_id: model.application_id,
            user_id: model.user_id,
            signature_type: SignatureType::from_db_str(&model.signature_type),
            data_fingerprint: model.data_fingerprint,
            result: SignatureAuditResult::from_db_str(&model.result),
            note: model.note,
            counter: model.counter as u64,
            timestamp_created: model.timestamp_created,
        }
    }
}

impl From<&SignatureAuditEntry> for ActiveModel {
    fn from(entry: &SignatureAuditEntry) -> Self {
        ActiveModel {
            id: if entry.id == 0 {
                NotSet
            } else {
                Set(entry.id as i64)
            },
            activation_id: Set(entry.activation_id.clone()),
            application_id: Set(entry.application_id),
            user_id: Set(entry.user_id.clone()),
            signature_type: Set(entry.signature_type.as_db_str().to_string()),
            data_fingerprint: Set(entry.data_fingerprint.clone()),
            result: Set(entry.result.as_db_str().to_string()),
            note: Set(entry.note.clone()),
            counter: Set(entry.counter as i64),
            timestamp_created: Set(entry.timestamp_created),
        }
    }
}
