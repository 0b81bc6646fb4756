//! Collaborator traits for the lifecycle engine
//!
//! The engine never reaches for process-wide clients. Every store and external
//! service it depends on is injected behind one of these traits, so the same
//! engine runs against the in-memory implementations in this crate, a database
//! backed implementation, or test fakes.

use crate::types::{
    GatewayError, IdempotencyRecord, LedgerBatch, LedgerEntry, Refund, RefundId, RefundStatus,
    StoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a compare-and-swap status write
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The refund was in an expected status and now holds the new one
    Applied(Refund),

    /// The refund's status did not match; the row is returned unchanged
    Mismatch(Refund),

    /// No refund with that id exists
    Missing,
}

/// Trait for refund persistence
pub trait RefundStore: Send + Sync {
    /// Get a refund by id
    fn get(&self, id: RefundId) -> Result<Option<Refund>, StoreError>;

    /// Get a refund by its external processor refund id
    fn find_by_processor_refund_id(&self, external_id: &str) -> Result<Option<Refund>, StoreError>;

    /// All refunds currently in `status`
    fn list_by_status(&self, status: RefundStatus) -> Result<Vec<Refund>, StoreError>;

    /// All refunds
    fn list(&self) -> Result<Vec<Refund>, StoreError>;

    /// Insert `candidate`, or merge into the row sharing its processor refund id
    ///
    /// The lookup and the write happen atomically with respect to other upserts
    /// of the same external id. Returns the stored row and whether it was
    /// created.
    fn upsert_by_processor_refund_id(
        &self,
        candidate: Refund,
        merge: &dyn Fn(&mut Refund),
    ) -> Result<(Refund, bool), StoreError>;

    /// Move a refund to `next` only if its current status is one of `expected`
    ///
    /// `posted_at` is written together with the status when provided.
    fn compare_and_set_status(
        &self,
        id: RefundId,
        expected: &[RefundStatus],
        next: RefundStatus,
        posted_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdate, StoreError>;
}

/// Trait for the append-only ledger
pub trait LedgerStore: Send + Sync {
    /// Append a batch of postings for one refund
    ///
    /// If a batch with the same reference was already appended for the refund,
    /// nothing is written and the stored entries of that batch are returned.
    /// Returns the stored entries and whether they were newly written.
    fn append(&self, batch: LedgerBatch) -> Result<(Vec<LedgerEntry>, bool), StoreError>;

    /// All postings of a refund in insertion order
    fn entries_for(&self, refund_id: RefundId) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Trait for idempotency record persistence
pub trait IdempotencyStore: Send + Sync {
    /// Look up a record
    fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Claim `key` with an `in_progress` record
    ///
    /// Fails with [`StoreError::Conflict`] if the key is already in progress or
    /// completed. A failed record is superseded by the new claim.
    fn insert_in_progress(&self, key: &str) -> Result<IdempotencyRecord, StoreError>;

    /// Mark the record completed with the captured result
    fn complete(&self, key: &str, response: serde_json::Value) -> Result<(), StoreError>;

    /// Mark the record failed so a later attempt may claim it
    fn mark_failed(&self, key: &str, error: &str) -> Result<(), StoreError>;
}

/// Direction of an ACH transfer, seen from the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Program funding source → consumer
    Credit,

    /// Consumer → program funding source
    Debit,
}

/// Transfer instruction sent to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub amount_cents: i64,
    pub direction: TransferDirection,
    /// Honored by the gateway as an additional dedup layer
    pub idempotency_key: String,
}

/// Gateway acknowledgement of an initiated transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// Trait for the ACH transfer gateway
pub trait TransferGateway: Send + Sync {
    /// Initiate a transfer
    fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError>;

    /// Look up a transfer previously initiated under `idempotency_key`
    fn find_transfer(&self, idempotency_key: &str) -> Result<Option<TransferReceipt>, GatewayError>;
}

/// Verification state of a consumer's bank destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationStatus {
    Verified,
    Unverified,
    Disabled,
}

/// A consumer bank account usable as transfer counterparty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutDestination {
    pub user_id: String,
    pub funding_source: String,
    pub status: DestinationStatus,
}

/// Trait for looking up consumer payout destinations
pub trait DestinationDirectory: Send + Sync {
    /// The consumer's verified destination, if any
    fn verified_destination(&self, user_id: &str) -> Result<Option<PayoutDestination>, StoreError>;

    /// Register a destination for a consumer
    fn link(&self, destination: PayoutDestination) -> Result<(), StoreError>;
}
