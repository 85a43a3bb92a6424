//! application version entity for database storage.

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use signet_types::ApplicationVersion;

/// application version database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "application_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    pub name: String,
    /// client credential identifier, Base64. unique.
    #[sea_orm(unique)]
    pub application_key: String,
    /// client credential secret, Base64.
    pub application_secret: String,
    pub supported: bool,
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

impl From<Model> for ApplicationVersion {
    fn from(model: Model) -> Self {
        ApplicationVersion {
            id: model.id,
            application_id: model.application_id,
            name: model.name,
            application_key: model.application_key,
            application_secret: model.application_secret,
            supported: model.supported,
        }
    }
}

impl From<&ApplicationVersion> for ActiveModel {
    fn from(version: &ApplicationVersion) -> Self {
        ActiveModel {
            id: if version.id == 0 {
                NotSet
            } else {
                Set(version.id)
            },
            application_id: Set(version.application_id),
            name: Set(version.name.clone()),
            application_key: Set(version.application_key.clone()),
            application_secret: Set(version.application_secret.clone()),
            supported: Set(version.supported),
        }
    }
}
