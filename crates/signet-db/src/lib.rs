//! database layer for signet.
//!
//! this crate provides persistent storage for:
//! - Activations
//! - Applications and application versions
//! - Master keypairs
//! - Signature audit and activation history (append-only)
//!
//! it also exposes a transactional surface for the atomic counter and lockout
//! updates the signature engine depends on.

#![warn(missing_docs)]

mod entity;
mod error;
mod migration;

pub use error::Error;

use std::future::Future;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database as SeaOrmDatabase,
    DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use signet_types::{
    Activation, ActivationHistoryEntry, ActivationStatus, Application, ApplicationVersion, Config,
    MasterKeyPair, SignatureAuditEntry,
};

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// database trait for signet storage operations.
///
/// this trait abstracts over different database backends (sqlite, postgresql).
/// it covers plain reads and inserts; the atomic read-modify-write path for
/// activations lives on [`SignetDb`] directly because it hands out a
/// transaction handle.
pub trait Database: Send + Sync {
    // ─── Health Check ─────────────────────────────────────────────────────────

    /// ping the database to verify connectivity.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    // ─── Application Operations ──────────────────────────────────────────────

    /// create a new application. returns the created application with its id.
    fn create_application(
        &self,
        application: &Application,
    ) -> impl Future<Output = Result<Application>> + Send;

    /// get an application by id.
    fn get_application(&self, id: i64) -> impl Future<Output = Result<Option<Application>>> + Send;

    /// create a new application version.
    fn create_application_version(
        &self,
        version: &ApplicationVersion,
    ) -> impl Future<Output = Result<ApplicationVersion>> + Send;

    /// get an application version by its client credential key.
    fn get_application_version_by_key(
        &self,
        application_key: &str,
    ) -> impl Future<Output = Result<Option<ApplicationVersion>>> + Send;

    // ─── Master Keypair Operations ───────────────────────────────────────────

    /// create a new master keypair.
    fn create_master_key_pair(
        &self,
        pair: &MasterKeyPair,
    ) -> impl Future<Output = Result<MasterKeyPair>> + Send;

    /// get a master keypair by id.
    fn get_master_key_pair(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<MasterKeyPair>>> + Send;

    /// get the newest master keypair for an application.
    fn get_latest_master_key_pair(
        &self,
        application_id: i64,
    ) -> impl Future<Output = Result<Option<MasterKeyPair>>> + Send;

    // ─── Activation Operations ───────────────────────────────────────────────

    /// insert a new activation record.
    fn create_activation(
        &self,
        activation: &Activation,
    ) -> impl Future<Output = Result<Activation>> + Send;

    /// get an activation by id.
    fn get_activation(
        &self,
        activation_id: &str,
    ) -> impl Future<Output = Result<Option<Activation>>> + Send;

    /// get an activation by code, restricted to an application and a set of
    /// statuses. used for key exchange and code uniqueness checks.
    fn get_activation_by_code(
        &self,
        application_id: i64,
        activation_code: &str,
        statuses: &[ActivationStatus],
    ) -> impl Future<Output = Result<Option<Activation>>> + Send;

    /// whether any record in one of the given statuses uses this code,
    /// regardless of application. used by the code generator.
    fn activation_code_in_use(
        &self,
        activation_code: &str,
        statuses: &[ActivationStatus],
    ) -> impl Future<Output = Result<bool>> + Send;

    /// update an existing activation record outside a locked transaction.
    fn update_activation(
        &self,
        activation: &Activation,
    ) -> impl Future<Output = Result<Activation>> + Send;

    /// list activations for a user, optionally restricted to one application.
    fn list_activations_for_user(
        &self,
        user_id: &str,
        application_id: Option<i64>,
    ) -> impl Future<Output = Result<Vec<Activation>>> + Send;

    /// lookup activations across users and applications with optional status
    /// and last-used filters.
    fn lookup_activations(
        &self,
        user_ids: &[String],
        application_ids: &[i64],
        status: Option<ActivationStatus>,
        last_used_before: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<Activation>>> + Send;

    /// list pending (CREATED / PENDING_COMMIT) activations past their expiry.
    fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Activation>>> + Send;

    // ─── Audit & History Operations ──────────────────────────────────────────

    /// append a signature audit entry.
    fn append_signature_audit(
        &self,
        entry: &SignatureAuditEntry,
    ) -> impl Future<Output = Result<SignatureAuditEntry>> + Send;

    /// list signature audit entries for an activation, in commit order.
    fn list_signature_audit(
        &self,
        activation_id: &str,
    ) -> impl Future<Output = Result<Vec<SignatureAuditEntry>>> + Send;

    /// append an activation history entry.
    fn append_activation_history(
        &self,
        entry: &ActivationHistoryEntry,
    ) -> impl Future<Output = Result<ActivationHistoryEntry>> + Send;

    /// list history entries for an activation within an optional time window.
    fn list_activation_history(
        &self,
        activation_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<ActivationHistoryEntry>>> + Send;
}

/// the main database implementation using sea-orm.
#[derive(Clone)]
pub struct SignetDb {
    conn: DatabaseConnection,
}

impl SignetDb {
    /// create a new database connection from config.
    pub async fn new(config: &Config) -> Result<Self> {
        let url = Self::build_connection_url(&config.database)?;
        let conn: DatabaseConnection = SeaOrmDatabase::connect(&url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &signet_types::DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // add ?mode=rwc to create file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }

    /// begin a locked read-modify-write cycle on one activation.
    ///
    /// the row is read with an exclusive lock where the backend supports it
    /// (postgres `SELECT ... FOR UPDATE`; sqlite serializes writers at the
    /// transaction level). the caller mutates the returned record, stores it
    /// through the transaction and commits. concurrent verifications of the
    /// same activation therefore produce a strict sequence of counter values.
    pub async fn begin_activation(
        &self,
        activation_id: &str,
    ) -> Result<(ActivationTransaction, Option<Activation>)> {
        let txn = self.conn.begin().await?;
        let mut query = entity::activation::Entity::find_by_id(activation_id);
        if self.conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let record = query.one(&txn).await?;
        Ok((ActivationTransaction { txn }, record.map(Into::into)))
    }

    /// like [`Self::begin_activation`], but resolving the record by activation
    /// code within one application and a set of statuses.
    pub async fn begin_activation_by_code(
        &self,
        application_id: i64,
        activation_code: &str,
        statuses: &[ActivationStatus],
    ) -> Result<(ActivationTransaction, Option<Activation>)> {
        let txn = self.conn.begin().await?;
        let mut query = entity::activation::Entity::find()
            .filter(entity::activation::Column::ApplicationId.eq(application_id))
            .filter(entity::activation::Column::ActivationCode.eq(activation_code))
            .filter(
                entity::activation::Column::ActivationStatus
                    .is_in(statuses.iter().map(|s| s.as_db_str())),
            );
        if self.conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let record = query.one(&txn).await?;
        Ok((ActivationTransaction { txn }, record.map(Into::into)))
    }
}

/// an open transaction holding the lock on one activation row.
pub struct ActivationTransaction {
    txn: DatabaseTransaction,
}

impl ActivationTransaction {
    /// write the mutated activation record back.
    pub async fn store_activation(&self, activation: &Activation) -> Result<()> {
        let model: entity::activation::ActiveModel = activation.into();
        model.update(&self.txn).await?;
        Ok(())
    }

    /// append a signature audit entry within the transaction.
    pub async fn append_signature_audit(&self, entry: &SignatureAuditEntry) -> Result<()> {
        let model: entity::signature_audit::ActiveModel = entry.into();
        model.insert(&self.txn).await?;
        Ok(())
    }

    /// append an activation history entry within the transaction.
    pub async fn append_activation_history(&self, entry: &ActivationHistoryEntry) -> Result<()> {
        let model: entity::activation_history::ActiveModel = entry.into();
        model.insert(&self.txn).await?;
        Ok(())
    }

    /// commit the transaction, releasing the row lock.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    /// roll the transaction back explicitly.
    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}

impl Database for SignetDb {
    // health check

    async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    // application operations

    async fn create_application(&self, application: &Application) -> Result<Application> {
        let model: entity::application::ActiveModel = application.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let result = entity::application::Entity::find_by_id(id)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn create_application_version(
        &self,
        version: &ApplicationVersion,
    ) -> Result<ApplicationVersion> {
        let model: entity::application_version::ActiveModel = version.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_application_version_by_key(
        &self,
        application_key: &str,
    ) -> Result<Option<ApplicationVersion>> {
        let result = entity::application_version::Entity::find()
            .filter(entity::application_version::Column::ApplicationKey.eq(application_key))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    // master keypair operations

    async fn create_master_key_pair(&self, pair: &MasterKeyPair) -> Result<MasterKeyPair> {
        let model: entity::master_key_pair::ActiveModel = pair.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_master_key_pair(&self, id: i64) -> Result<Option<MasterKeyPair>> {
        let result = entity::master_key_pair::Entity::find_by_id(id)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn get_latest_master_key_pair(
        &self,
        application_id: i64,
    ) -> Result<Option<MasterKeyPair>> {
        let result = entity::master_key_pair::Entity::find()
            .filter(entity::master_key_pair::Column::ApplicationId.eq(application_id))
            .order_by_desc(entity::master_key_pair::Column::TimestampCreated)
            .order_by_desc(entity::master_key_pair::Column::Id)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    // activation operations

    async fn create_activation(&self, activation: &Activation) -> Result<Activation> {
        let model: entity::activation::ActiveModel = activation.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_activation(&self, activation_id: &str) -> Result<Option<Activation>> {
        let result = entity::activation::Entity::find_by_id(activation_id)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn get_activation_by_code(
        &self,
        application_id: i64,
        activation_code: &str,
        statuses: &[ActivationStatus],
    ) -> Result<Option<Activation>> {
        let result = entity::activation::Entity::find()
            .filter(entity::activation::Column::ApplicationId.eq(application_id))
            .filter(entity::activation::Column::ActivationCode.eq(activation_code))
            .filter(
                entity::activation::Column::ActivationStatus
                    .is_in(statuses.iter().map(|s| s.as_db_str())),
            )
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn activation_code_in_use(
        &self,
        activation_code: &str,
        statuses: &[ActivationStatus],
    ) -> Result<bool> {
        let count = entity::activation::Entity::find()
            .filter(entity::activation::Column::ActivationCode.eq(activation_code))
            .filter(
                entity::activation::Column::ActivationStatus
                    .is_in(statuses.iter().map(|s| s.as_db_str())),
            )
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }

    async fn update_activation(&self, activation: &Activation) -> Result<Activation> {
        let model: entity::activation::ActiveModel = activation.into();
        let result = model.update(&self.conn).await?;
        Ok(result.into())
    }

    async fn list_activations_for_user(
        &self,
        user_id: &str,
        application_id: Option<i64>,
    ) -> Result<Vec<Activation>> {
        let mut query = entity::activation::Entity::find()
            .filter(entity::activation::Column::UserId.eq(user_id));
        if let Some(app_id) = application_id {
            query = query.filter(entity::activation::Column::ApplicationId.eq(app_id));
        }
        let results = query
            .order_by_desc(entity::activation::Column::TimestampCreated)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn lookup_activations(
        &self,
        user_ids: &[String],
        application_ids: &[i64],
        status: Option<ActivationStatus>,
        last_used_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activation>> {
        let mut query = entity::activation::Entity::find();
        if !user_ids.is_empty() {
            query = query.filter(entity::activation::Column::UserId.is_in(user_ids.to_vec()));
        }
        if !application_ids.is_empty() {
            query = query
                .filter(entity::activation::Column::ApplicationId.is_in(application_ids.to_vec()));
        }
        if let Some(status) = status {
            query =
                query.filter(entity::activation::Column::ActivationStatus.eq(status.as_db_str()));
        }
        if let Some(before) = last_used_before {
            query = query.filter(entity::activation::Column::TimestampLastUsed.lt(before));
        }
        let results = query
            .order_by_desc(entity::activation::Column::TimestampCreated)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Activation>> {
        let results = entity::activation::Entity::find()
            .filter(entity::activation::Column::ActivationStatus.is_in([
                ActivationStatus::Created.as_db_str(),
                ActivationStatus::PendingCommit.as_db_str(),
            ]))
            .filter(entity::activation::Column::TimestampActivationExpire.lt(now))
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    // audit & history operations

    async fn append_signature_audit(
        &self,
        entry: &SignatureAuditEntry,
    ) -> Result<SignatureAuditEntry> {
        let model: entity::signature_audit::ActiveModel = entry.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn list_signature_audit(&self, activation_id: &str) -> Result<Vec<SignatureAuditEntry>> {
        let results = entity::signature_audit::Entity::find()
            .filter(entity::signature_audit::Column::ActivationId.eq(activation_id))
            .order_by_asc(entity::signature_audit::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn append_activation_history(
        &self,
        entry: &ActivationHistoryEntry,
    ) -> Result<ActivationHistoryEntry> {
        let model: entity::activation_history::ActiveModel = entry.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn list_activation_history(
        &self,
        activation_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivationHistoryEntry>> {
        let mut query = entity::activation_history::Entity::find()
            .filter(entity::activation_history::Column::ActivationId.eq(activation_id));
        if let Some(from) = from {
            query = query.filter(entity::activation_history::Column::TimestampCreated.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(entity::activation_history::Column::TimestampCreated.lte(to));
        }
        let results = query
            .order_by_asc(entity::activation_history::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }
}
