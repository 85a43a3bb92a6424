//! create signature_audit table migration

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
                    .table(SignatureAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SignatureAudit::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SignatureAudit::ActivationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SignatureAudit::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SignatureAudit::UserId).string().not_null())
                    .col(
                        ColumnDef::new(SignatureAudit::SignatureType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SignatureAudit::DataFingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SignatureAudit::Result).string().not_null())
                    .col(ColumnDef::new(SignatureAudit::Note).string())
                    .col(
                        ColumnDef::new(SignatureAudit::Counter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SignatureAudit::TimestampCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_signature_audit_activation")
                            .from(SignatureAudit::Table, SignatureAudit::ActivationId)
                            .to(Activations::Table, Activations::ActivationId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index for per-activation audit queries in commit order
        manager
            .create_index(
                Index::create()
                    .name("idx_signature_audit_activation")
                    .table(SignatureAudit::Table)
                    .col(SignatureAudit::ActivationId)
                    .col(SignatureAudit::Id)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SignatureAudit::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SignatureAudit {
    Table,
    Id,
    ActivationId,
    ApplicationId,
    UserId,
    SignatureType,
    DataFingerprint,
    Result,
    Note,
    Counter,
    TimestampCreated,
}
