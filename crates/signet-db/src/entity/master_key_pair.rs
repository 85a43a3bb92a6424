//! master keypair entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use signet_types::MasterKeyPair;

/// master keypair database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "master_key_pairs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// private key, Base64 of the raw scalar
    #[sea_orm(column_type = "Text")]
    pub master_key_private: String,
    /// public key, Base64 of the uncompressed SEC1 point
    #[sea_orm(column_type = "Text")]
    pub master_key_public: String,
    pub timestamp_created: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for MasterKeyPair {
    fn from(model: Model) -> Self {
        MasterKeyPair {
            id: model.id,
            application_id: model.application_id,
            master_key_private: model.master_key_private,
            master_key_public: model.master_key_public,
            timestamp_created: model.timestamp_created,
        }
    }
}

impl From<&MasterKeyPair> for ActiveModel {
    fn from(pair: &MasterKeyPair) -> Self {
        ActiveModel {
            id: if pair.id == 0 { NotSet } else { Set(pair.id) },
            application_id: Set(pair.application_id),
            master_key_private: Set(pair.master_key_private.clone()),
            master_key_public: Set(pair.master_key_public.clone()),
            timestamp_created: Set(pair.timestamp_created),
        }
    }
}
