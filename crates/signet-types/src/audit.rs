//! append-only audit and history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activation::ActivationStatus;
use crate::signature::SignatureType;

/// outcome of a signature verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAuditResult {
    /// signature matched within the lookahead window.
    Ok,
    /// signature did not match, or the record was not in a verifiable state.
    Failed,
}

impl SignatureAuditResult {
    /// database column value for this result.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SignatureAuditResult::Ok => "ok",
            SignatureAuditResult::Failed => "failed",
        }
    }

    /// parse a database column value.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ok" => SignatureAuditResult::Ok,
            _ => SignatureAuditResult::Failed,
        }
    }
}

/// one row of the append-only signature attempt log.
///
/// entries are written in the same transaction as the counter update, so the
/// log order agrees with the committed counter order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureAuditEntry {
    /// numeric primary key (0 until persisted).
    pub id: u64,
    /// activation the attempt was made against.
    pub activation_id: String,
    /// owning application.
    pub application_id: i64,
    /// user owning the activation.
    pub user_id: String,
    /// factor combination the client claimed.
    pub signature_type: SignatureType,
    /// hex SHA-256 of the signed data; the data itself is not retained.
    pub data_fingerprint: String,
    /// verification outcome.
    pub result: SignatureAuditResult,
    /// free-form diagnostic note.
    pub note: Option<String>,
    /// counter value the record held when the attempt was evaluated.
    pub counter: u64,
    /// when the attempt was evaluated.
    pub timestamp_created: DateTime<Utc>,
}

/// one row of the append-only activation lifecycle log.
///
/// every status transition appends exactly one entry, durable before any
/// callback for the transition is enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationHistoryEntry {
    /// numeric primary key (0 until persisted).
    pub id: u64,
    /// activation the entry belongs to.
    pub activation_id: String,
    /// status after the transition.
    pub activation_status: ActivationStatus,
    /// free-form transition reason (e.g. a blocked reason).
    pub event_reason: Option<String>,
    /// identity of the admin user who triggered the transition, if any.
    pub external_user_id: Option<String>,
    /// when the transition was committed.
    pub timestamp_created: DateTime<Utc>,
}
