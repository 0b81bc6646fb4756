//! Refund-related types for the Refund Advance Engine
//!
//! This module defines the refund record, its lifecycle status and the
//! identifiers used to correlate a refund with the upstream processor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Refund identifier
///
/// Generated by the engine when a refund is first created.
pub type RefundId = Uuid;

/// Consumer identifier (opaque to the engine)
pub type UserId = String;

/// Lifecycle status of a refund
///
/// Statuses only ever move forward:
///
/// ```text
/// initiated → approved → instant_sent → posted → recouped
///                             └──────────────────────┘
///                          (collect before the bank posts)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Known to the system but not yet approved by the processor
    Initiated,

    /// Approved by the processor; eligible for an advance
    Approved,

    /// Advance credit sent to the consumer
    InstantSent,

    /// The underlying refund has posted to the consumer's bank
    Posted,

    /// The advance has been recovered (terminal)
    Recouped,
}

impl RefundStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Initiated => "initiated",
            RefundStatus::Approved => "approved",
            RefundStatus::InstantSent => "instant_sent",
            RefundStatus::Posted => "posted",
            RefundStatus::Recouped => "recouped",
        }
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Initiated, Approved)
                | (Approved, InstantSent)
                | (InstantSent, Posted)
                | (InstantSent, Recouped)
                | (Posted, Recouped)
        )
    }

    /// Whether the refund has reached its terminal status
    pub fn is_terminal(self) -> bool {
        self == RefundStatus::Recouped
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "initiated" => Ok(RefundStatus::Initiated),
            "approved" => Ok(RefundStatus::Approved),
            "instant_sent" => Ok(RefundStatus::InstantSent),
            "posted" => Ok(RefundStatus::Posted),
            "recouped" => Ok(RefundStatus::Recouped),
            other => Err(format!("Unknown refund status '{}'", other)),
        }
    }
}

/// A merchant refund tracked by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Engine-generated identifier
    pub id: RefundId,

    /// Consumer the refund is owed to
    pub user_id: UserId,

    /// Merchant reference supplied by the processor event
    pub merchant_id: Option<String>,

    /// External refund id; inbound events are deduplicated on this field
    pub processor_refund_id: String,

    /// Charge the refund was issued against
    pub original_charge_id: Option<String>,

    /// Refund principal in cents
    ///
    /// Immutable once the refund has been created.
    pub amount_cents: i64,

    /// Last four digits of the refunded card, when the processor reports it
    pub card_last4: Option<String>,

    /// Current lifecycle status
    pub status: RefundStatus,

    /// Set when the refund transitions to `posted`
    pub posted_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Refund {
    /// Create a new approved refund with a freshly generated id
    pub fn approved(
        processor_refund_id: impl Into<String>,
        user_id: impl Into<UserId>,
        amount_cents: i64,
    ) -> Self {
        Refund {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            merchant_id: None,
            processor_refund_id: processor_refund_id.into(),
            original_charge_id: None,
            amount_cents,
            card_last4: None,
            status: RefundStatus::Approved,
            posted_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::approve(RefundStatus::Initiated, RefundStatus::Approved, true)]
    #[case::advance(RefundStatus::Approved, RefundStatus::InstantSent, true)]
    #[case::post(RefundStatus::InstantSent, RefundStatus::Posted, true)]
    #[case::collect_early(RefundStatus::InstantSent, RefundStatus::Recouped, true)]
    #[case::collect(RefundStatus::Posted, RefundStatus::Recouped, true)]
    #[case::skip_advance(RefundStatus::Approved, RefundStatus::Posted, false)]
    #[case::skip_to_end(RefundStatus::Approved, RefundStatus::Recouped, false)]
    #[case::backwards(RefundStatus::Posted, RefundStatus::InstantSent, false)]
    #[case::terminal(RefundStatus::Recouped, RefundStatus::Approved, false)]
    #[case::self_loop(RefundStatus::Approved, RefundStatus::Approved, false)]
    fn test_transition_graph(
        #[case] from: RefundStatus,
        #[case] to: RefundStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case("initiated", RefundStatus::Initiated)]
    #[case("approved", RefundStatus::Approved)]
    #[case("INSTANT_SENT", RefundStatus::InstantSent)]
    #[case(" posted ", RefundStatus::Posted)]
    #[case("recouped", RefundStatus::Recouped)]
    fn test_status_parsing(#[case] input: &str, #[case] expected: RefundStatus) {
        assert_eq!(input.parse::<RefundStatus>().unwrap(), expected);
        assert_eq!(expected.to_string(), expected.as_str());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&RefundStatus::InstantSent).unwrap();
        assert_eq!(json, "\"instant_sent\"");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("refunded".parse::<RefundStatus>().is_err());
    }

    #[test]
    fn test_only_recouped_is_terminal() {
        assert!(RefundStatus::Recouped.is_terminal());
        assert!(!RefundStatus::Posted.is_terminal());
    }
}
