//! activation history entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use signet_types::{ActivationHistoryEntry, ActivationStatus};

/// activation history database model. append-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activation_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activation_id: String,
    /// activationstatus as string
    pub activation_status: String,
    pub event_reason: Option<String>,
    pub external_user_id: Option<String>,
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

impl From<Model> for ActivationHistoryEntry {
    fn from(model: Model) -> Self {
        ActivationHistoryEntry {
            id: model.id as u64,
            activation_id: model.activation_id,
            activation_status: ActivationStatus::from_db_str(&model.activation_status),
            event_reason: model.event_reason,
            external_user_id: model.external_user_id,
            timestamp_created: model.timestamp_created,
        }
    }
}

impl From<&ActivationHistoryEntry> for ActiveModel {
    fn from(entry: &ActivationHistoryEntry) -> Self {
        ActiveModel {
            id: if entry.id == 0 {
                NotSet
            } else {
                Set(entry.id as i64)
            },
            activation_id: Set(entry.activation_id.clone()),
            activation_status: Set(entry.activation_status.as_db_str().to_string()),
            event_reason: Set(entry.event_reason.clone()),
            external_user_id: Set(entry.external_user_id.clone()),
            timestamp_created: Set(entry.timestamp_created),
        }
    }
}
