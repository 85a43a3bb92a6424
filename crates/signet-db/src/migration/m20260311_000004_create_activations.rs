//! create activations table migration

use sea_orm_migration::prelude::*;

use super::m20260310_000001_create_applications::Applications;
use super::m20260310_000003_create_master_key_pairs::MasterKeyPairs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activations::ActivationId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Activations::ActivationCode)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activations::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Activations::MasterKeyPairId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::ServerPublicKey)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::ServerPrivateKey)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::ServerPrivateKeyEncryption)
                            .string()
                            .not_null()
                            .default("no_encryption"),
                    )
                    .col(ColumnDef::new(Activations::DevicePublicKey).text())
                    .col(ColumnDef::new(Activations::ActivationName).string())
                    .col(ColumnDef::new(Activations::Extras).string())
                    .col(
                        ColumnDef::new(Activations::Counter)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Activations::CtrData).var_binary(16))
                    .col(
                        ColumnDef::new(Activations::FailedAttempts)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Activations::MaxFailedAttempts)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::ActivationStatus)
                            .string()
                            .not_null()
                            .default("created"),
                    )
                    .col(ColumnDef::new(Activations::BlockedReason).string())
                    .col(ColumnDef::new(Activations::ActivationOtp).string())
                    .col(
                        ColumnDef::new(Activations::ActivationOtpValidation)
                            .string()
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(Activations::Version)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(Activations::ActivationFlags)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Activations::TimestampCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::TimestampActivationExpire)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activations::TimestampLastUsed)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activations_application")
                            .from(Activations::Table, Activations::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activations_master_key_pair")
                            .from(Activations::Table, Activations::MasterKeyPairId)
                            .to(MasterKeyPairs::Table, MasterKeyPairs::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // index on activation_code for key exchange lookups. uniqueness among
        // non-terminal records is enforced by the service, not the schema.
        manager
            .create_index(
                Index::create()
                    .name("idx_activations_code")
                    .table(Activations::Table)
                    .col(Activations::ActivationCode)
                    .to_owned(),
            )
            .await?;

        // index on user_id for listing
        manager
            .create_index(
                Index::create()
                    .name("idx_activations_user_id")
                    .table(Activations::Table)
                    .col(Activations::UserId)
                    .to_owned(),
            )
            .await?;

        // index for the expiration sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_activations_status_expire")
                    .table(Activations::Table)
                    .col(Activations::ActivationStatus)
                    .col(Activations::TimestampActivationExpire)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Activations {
    Table,
    ActivationId,
    ActivationCode,
    ApplicationId,
    UserId,
    MasterKeyPairId,
    ServerPublicKey,
    ServerPrivateKey,
    ServerPrivateKeyEncryption,
    DevicePublicKey,
    ActivationName,
    Extras,
    Counter,
    CtrData,
    FailedAttempts,
    MaxFailedAttempts,
    ActivationStatus,
    BlockedReason,
    ActivationOtp,
    ActivationOtpValidation,
    Version,
    ActivationFlags,
    TimestampCreated,
    TimestampActivationExpire,
    TimestampLastUsed,
}
