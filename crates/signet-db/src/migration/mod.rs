//! database migrations for signet.

pub use sea_orm_migration::prelude::*;

mod m20260310_000001_create_applications;
mod m20260310_000002_create_application_versions;
mod m20260310_000003_create_master_key_pairs;
mod m20260311_000004_create_activations;
mod m20260311_000005_create_signature_audit;
mod m20260312_000006_create_activation_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260310_000001_create_applications::Migration),
            Box::new(m20260310_000002_create_application_versions::Migration),
            Box::new(m20260310_000003_create_master_key_pairs::Migration),
            Box::new(m20260311_000004_create_activations::Migration),
            Box::new(m20260311_000005_create_signature_audit::Migration),
            Box::new(m20260312_000006_create_activation_history::Migration),
        ]
    }
}
