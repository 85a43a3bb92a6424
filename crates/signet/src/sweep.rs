//! expiration sweep for uncommitted activations.
//!
//! a periodic task that moves CREATED / PENDING_COMMIT records past their
//! expiry to REMOVED, tombstoning key material. the same check also runs
//! lazily on the read paths; the sweep bounds how long an expired record can
//! linger when nobody touches it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use signet_db::{Database, SignetDb};
use signet_types::ActivationHistoryEntry;

use crate::callback::{CallbackSink, StatusChangeEvent};

/// periodic sweeper for expired pending activations.
#[derive(Clone)]
pub struct ExpirationSweeper {
    db: SignetDb,
    callbacks: Arc<dyn CallbackSink>,
    interval: Duration,
}

impl ExpirationSweeper {
    /// create a new sweeper.
    ///
    /// if `interval_secs` is 0, the sweep is disabled.
    pub fn new(db: SignetDb, callbacks: Arc<dyn CallbackSink>, interval_secs: u64) -> Self {
        Self {
            db,
            callbacks,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// check if the sweep is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// run one sweep cycle. returns the number of records removed.
    pub async fn collect(&self) -> usize {
        let now = Utc::now();
        let expired = match self.db.list_expired_pending(now).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "expiration sweep query failed");
                return 0;
            }
        };

        let mut removed = 0;
        for mut activation in expired {
            activation.tombstone();
            if let Err(e) = self.db.update_activation(&activation).await {
                warn!(
                    activation_id = %activation.activation_id,
                    error = %e,
                    "failed to remove expired activation"
                );
                continue;
            }
            // history must be durable before the callback is enqueued
            if let Err(e) = self
                .db
                .append_activation_history(&ActivationHistoryEntry {
                    id: 0,
                    activation_id: activation.activation_id.clone(),
                    activation_status: activation.activation_status,
                    event_reason: Some("activation_expired".to_string()),
                    external_user_id: None,
                    timestamp_created: now,
                })
                .await
            {
                warn!(
                    activation_id = %activation.activation_id,
                    error = %e,
                    "failed to append history for expired activation"
                );
            }
            self.callbacks.notify(StatusChangeEvent {
                activation_id: activation.activation_id.clone(),
                application_id: activation.application_id,
                activation_status: activation.activation_status,
                timestamp: now,
            });
            info!(activation_id = %activation.activation_id, "removed expired activation");
            removed += 1;
        }
        removed
    }

    /// spawn the background sweep task.
    pub fn spawn_sweeper(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.is_enabled() {
                debug!("expiration sweep disabled (interval = 0)");
                return;
            }

            info!(
                interval_secs = self.interval.as_secs(),
                "starting activation expiration sweep"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let removed = self.collect().await;
                if removed > 0 {
                    debug!(removed, "expiration sweep cycle completed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NullCallbackSink;
    use signet_types::{
        Activation, ActivationStatus, Application, KeyEncryptionMode, MasterKeyPair, OtpValidation,
    };

    async fn setup() -> (SignetDb, Activation) {
        let db = SignetDb::new_in_memory().await.unwrap();
        let application = db
            .create_application(&Application {
                id: 0,
                name: "sweep-test".to_string(),
            })
            .await
            .unwrap();
        let pair = db
            .create_master_key_pair(&MasterKeyPair {
                id: 0,
                application_id: application.id,
                master_key_private: "cHJpdg==".to_string(),
                master_key_public: "cHVi".to_string(),
                timestamp_created: Utc::now(),
            })
            .await
            .unwrap();

        let now = Utc::now();
        let activation = Activation {
            activation_id: Activation::generate_id(),
            activation_code: "AAAAA-BBBBB-CCCCC-DDDDD".to_string(),
            application_id: application.id,
            user_id: "user-1".to_string(),
            master_key_pair_id: pair.id,
            server_public_key: "cHVi".to_string(),
            server_private_key: "cHJpdg==".to_string(),
            server_private_key_encryption: KeyEncryptionMode::NoEncryption,
            device_public_key: None,
            activation_name: None,
            extras: None,
            counter: 0,
            ctr_data: None,
            failed_attempts: 0,
            max_failed_attempts: 5,
            activation_status: ActivationStatus::Created,
            blocked_reason: None,
            activation_otp: None,
            activation_otp_validation: OtpValidation::None,
            version: 3,
            activation_flags: vec![],
            timestamp_created: now,
            timestamp_activation_expire: now - chrono::Duration::seconds(1),
            timestamp_last_used: now,
        };
        let activation = db.create_activation(&activation).await.unwrap();
        (db, activation)
    }

    #[tokio::test]
    async fn test_collect_removes_expired_and_appends_history() {
        let (db, activation) = setup().await;
        let sweeper = ExpirationSweeper::new(db.clone(), Arc::new(NullCallbackSink), 60);

        assert_eq!(sweeper.collect().await, 1);

        let reloaded = db
            .get_activation(&activation.activation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.activation_status, ActivationStatus::Removed);
        assert!(reloaded.server_private_key.is_empty());

        let history = db
            .list_activation_history(&activation.activation_id, None, None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].activation_status, ActivationStatus::Removed);
        assert_eq!(
            history[0].event_reason.as_deref(),
            Some("activation_expired")
        );

        // second sweep finds nothing
        assert_eq!(sweeper.collect().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_when_interval_zero() {
        let (db, _) = setup().await;
        let sweeper = ExpirationSweeper::new(db, Arc::new(NullCallbackSink), 0);
        assert!(!sweeper.is_enabled());
    }
}
