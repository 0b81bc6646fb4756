//! Inbound lifecycle signals
//!
//! Typed shapes of the two signals Event Ingestion feeds into the engine. They
//! are validated at the ingestion boundary before they reach the engine.

use super::refund::{RefundId, UserId};

/// The processor approved a refund for a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundApproved {
    /// Processor refund id (dedup key for the refund row)
    pub external_refund_id: String,
    pub charge_id: Option<String>,
    pub amount_cents: i64,
    pub card_last4: Option<String>,
    pub merchant_ref: Option<String>,
    pub user_id: UserId,
}

/// A credit matching an advanced refund was observed at the consumer's bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPosted {
    /// Absolute credit amount in cents
    pub matched_amount_cents: i64,

    /// Explicit correlation to a refund, when the bank side carries one
    ///
    /// Without it, refunds are matched by exact amount among those in
    /// `instant_sent`, which cannot tell apart two outstanding advances of the
    /// same amount.
    pub refund_id: Option<RefundId>,
}

impl TransactionPosted {
    /// A posting signal matched by amount only
    pub fn by_amount(matched_amount_cents: i64) -> Self {
        Self {
            matched_amount_cents,
            refund_id: None,
        }
    }
}
