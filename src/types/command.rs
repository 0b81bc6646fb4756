//! Lifecycle commands
//!
//! A lifecycle command is one row of a replay script: an inbound signal or an
//! operator action to apply to the engine. Commands name refunds by their
//! external (processor) refund id, since engine ids are generated at creation.

use super::refund::UserId;

/// Lifecycle command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Link a verified payout destination for a consumer
    LinkAccount { user: UserId },

    /// Processor approved a refund (create or upsert)
    Approve {
        external_refund_id: String,
        amount_cents: i64,
        user: Option<UserId>,
    },

    /// Advance the refund to the consumer
    Advance { external_refund_id: String },

    /// Demo transition: mark the refund posted
    MarkPosted { external_refund_id: String },

    /// Bank-data credit observed, optionally correlated to a refund
    BankCredit {
        amount_cents: i64,
        external_refund_id: Option<String>,
    },

    /// Collect the advance back from the consumer
    Collect { external_refund_id: String },

    /// Demo transition: mark the refund recouped
    MarkRecouped { external_refund_id: String },

    /// Run the reconciliation pass
    Reconcile,
}

impl LifecycleCommand {
    /// External refund id the command is scoped to
    ///
    /// Commands without a refund (account links, uncorrelated bank credits,
    /// reconciliation) can touch any refund and must not be reordered with
    /// respect to the commands around them.
    pub fn refund_key(&self) -> Option<&str> {
        match self {
            LifecycleCommand::Approve {
                external_refund_id, ..
            }
            | LifecycleCommand::Advance { external_refund_id }
            | LifecycleCommand::MarkPosted { external_refund_id }
            | LifecycleCommand::Collect { external_refund_id }
            | LifecycleCommand::MarkRecouped { external_refund_id } => Some(external_refund_id),
            LifecycleCommand::BankCredit {
                external_refund_id, ..
            } => external_refund_id.as_deref(),
            LifecycleCommand::LinkAccount { .. } | LifecycleCommand::Reconcile => None,
        }
    }

    /// Short operation name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleCommand::LinkAccount { .. } => "link",
            LifecycleCommand::Approve { .. } => "approve",
            LifecycleCommand::Advance { .. } => "advance",
            LifecycleCommand::MarkPosted { .. } => "post",
            LifecycleCommand::BankCredit { .. } => "bank_credit",
            LifecycleCommand::Collect { .. } => "collect",
            LifecycleCommand::MarkRecouped { .. } => "recoup",
            LifecycleCommand::Reconcile => "reconcile",
        }
    }
}
