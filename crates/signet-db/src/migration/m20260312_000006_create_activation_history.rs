//! create activation_history table migration

use sea_orm_migration::prelude::*;

use super::m20260311_000004_create_activations::Activations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivationHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivationHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActivationHistory::ActivationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivationHistory::ActivationStatus)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivationHistory::EventReason).string())
                    .col(ColumnDef::new(ActivationHistory::ExternalUserId).string())
                    .col(
                        ColumnDef::new(ActivationHistory::TimestampCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activation_history_activation")
                            .from(ActivationHistory::Table, ActivationHistory::ActivationId)
                            .to(Activations::Table, Activations::ActivationId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index for per-activation history queries
        manager
            .create_index(
                Index::create()
                    .name("idx_activation_history_activation")
                    .table(ActivationHistory::Table)
                    .col(ActivationHistory::ActivationId)
                    .col(ActivationHistory::Id)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivationHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ActivationHistory {
    Table,
    Id,
    ActivationId,
    ActivationStatus,
    EventReason,
    ExternalUserId,
    TimestampCreated,
}
