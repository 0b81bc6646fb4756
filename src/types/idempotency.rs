//! Idempotency types
//!
//! An [`IdempotencyRecord`] tracks one guarded operation. Keys are
//! operation-scoped strings built with [`OperationKey`] or taken verbatim from
//! an inbound event id.

use super::refund::RefundId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// Claimed by a caller that is still running the operation
    InProgress,

    /// Finished successfully; `response_body` holds the captured result
    Completed,

    /// Last attempt failed; a new attempt may claim the key
    Failed,
}

/// Dedup control record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub status: IdempotencyStatus,
    pub response_body: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Number of times the key has been claimed
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// A freshly claimed record
    pub fn in_progress(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            status: IdempotencyStatus::InProgress,
            response_body: None,
            error_message: None,
            attempts: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Idempotency keys for engine operations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    /// `advance:<refundId>`
    Advance(RefundId),

    /// `collect:<refundId>`
    Collect(RefundId),

    /// `recoup:<refundId>` (ledger reference of the demo recoup transition)
    Recoup(RefundId),

    /// `bank-txn:<transactionId>` (bank-data webhook dedup)
    BankTransaction(String),

    /// An externally supplied event id, used as-is
    Event(String),
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKey::Advance(id) => write!(f, "advance:{}", id),
            OperationKey::Collect(id) => write!(f, "collect:{}", id),
            OperationKey::Recoup(id) => write!(f, "recoup:{}", id),
            OperationKey::BankTransaction(id) => write!(f, "bank-txn:{}", id),
            OperationKey::Event(id) => f.write_str(id),
        }
    }
}
