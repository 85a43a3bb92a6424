//! create application_versions table migration

use sea_orm_migration::prelude::*;

use super::m20260310_000001_create_applications::Applications;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApplicationVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApplicationVersions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ApplicationVersions::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApplicationVersions::Name).string().not_null())
                    .col(
                        ColumnDef::new(ApplicationVersions::ApplicationKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ApplicationVersions::ApplicationSecret)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApplicationVersions::Supported)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_application_versions_application")
                            .from(ApplicationVersions::Table, ApplicationVersions::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index on application_key for client credential lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_application_versions_key")
                    .table(ApplicationVersions::Table)
                    .col(ApplicationVersions::ApplicationKey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApplicationVersions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ApplicationVersions {
    Table,
    Id,
    ApplicationId,
    Name,
    ApplicationKey,
    ApplicationSecret,
    Supported,
}
