//! Ledger types
//!
//! Ledger entries are immutable signed postings tied to a refund. The signed sum
//! of a refund's entries is its running balance: money the platform has paid out
//! and not yet recovered.

use super::refund::RefundId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of ledger posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    /// Principal credited to the consumer (positive)
    Advance,

    /// Platform fee for fronting the advance (positive)
    Fee,

    /// Principal debited back from the consumer (negative)
    Repayment,

    /// Manual or out-of-band correction (either sign)
    Adjustment,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerEntryType::Advance => "advance",
            LedgerEntryType::Fee => "fee",
            LedgerEntryType::Repayment => "repayment",
            LedgerEntryType::Adjustment => "adjustment",
        };
        f.write_str(name)
    }
}

/// Posting currency. Only USD is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    Usd,
}

/// A posting that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub transfer_id: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(entry_type: LedgerEntryType, amount_cents: i64, transfer_id: Option<String>) -> Self {
        Self {
            entry_type,
            amount_cents,
            transfer_id,
        }
    }
}

/// A group of postings written together
///
/// `reference` names the operation that produced the batch (for example
/// `advance:<refundId>`). A store never writes two batches with the same
/// reference for the same refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBatch {
    pub refund_id: RefundId,
    pub reference: String,
    pub entries: Vec<NewLedgerEntry>,
}

/// A stored, immutable posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub refund_id: RefundId,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub currency: Currency,
    pub reference: String,
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Signed sum of a set of ledger entries
pub fn ledger_balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|entry| entry.amount_cents).sum()
}
