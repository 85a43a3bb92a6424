//! application entity for database storage.

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use signet_types::Application;

/// application database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::application_version::Entity")]
    ApplicationVersion,
    #[sea_orm(has_many = "super::master_key_pair::Entity")]
    MasterKeyPair,
}

impl Related<super::application_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApplicationVersion.def()
    }
}

impl Related<super::master_key_pair::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MasterKeyPair.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Application {
    fn from(model: Model) -> Self {
        Application {
            id: model.id,
            name: model.name,
        }
    }
}

impl From<&Application> for ActiveModel {
    fn from(application: &Application) -> Self {
        ActiveModel {
            id: if application.id == 0 {
                NotSet
            } else {
                Set(application.id)
            },
            name: Set(application.name.clone()),
        }
    }
}
