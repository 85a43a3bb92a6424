//! create master_key_pairs table migration

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
                    .table(MasterKeyPairs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MasterKeyPairs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MasterKeyPairs::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MasterKeyPairs::MasterKeyPrivate)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MasterKeyPairs::MasterKeyPublic)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MasterKeyPairs::TimestampCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_master_key_pairs_application")
                            .from(MasterKeyPairs::Table, MasterKeyPairs::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index for "newest pair per application" lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_master_key_pairs_app_created")
                    .table(MasterKeyPairs::Table)
                    .col(MasterKeyPairs::ApplicationId)
                    .col(MasterKeyPairs::TimestampCreated)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MasterKeyPairs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MasterKeyPairs {
    Table,
    Id,
    ApplicationId,
    MasterKeyPrivate,
    MasterKeyPublic,
    TimestampCreated,
}
