//! Command dispatch onto the lifecycle engine
//!
//! Scripts and batch processing speak in [`LifecycleCommand`]s that name
//! refunds by their processor refund id. The `CommandDispatcher` resolves those
//! ids and calls the matching engine operation.

use crate::core::lifecycle::{RefundLifecycleEngine, RefundSummary};
use crate::types::{LifecycleCommand, RefundApproved, RefundError, TransactionPosted};
use tracing::debug;

/// Funding source linked for a consumer by a `link` command
pub fn funding_source_for(user_id: &str) -> String {
    format!("urn:funding-source:{}", user_id)
}

/// Applies lifecycle commands to an engine
#[derive(Clone)]
pub struct CommandDispatcher {
    engine: RefundLifecycleEngine,

    /// Consumer credited when an approval names none
    default_user_id: String,
}

impl CommandDispatcher {
    pub fn new(engine: RefundLifecycleEngine, default_user_id: impl Into<String>) -> Self {
        Self {
            engine,
            default_user_id: default_user_id.into(),
        }
    }

    pub fn engine(&self) -> &RefundLifecycleEngine {
        &self.engine
    }

    /// Apply one command
    ///
    /// Errors are the engine's; the caller decides whether to log and move on.
    pub fn apply(&self, command: LifecycleCommand) -> Result<(), RefundError> {
        debug!(op = command.name(), refund = ?command.refund_key(), "applying command");

        match command {
            LifecycleCommand::LinkAccount { user } => self
                .engine
                .link_destination(&user, &funding_source_for(&user)),
            LifecycleCommand::Approve {
                external_refund_id,
                amount_cents,
                user,
            } => {
                let event = RefundApproved {
                    external_refund_id,
                    charge_id: None,
                    amount_cents,
                    card_last4: None,
                    merchant_ref: None,
                    user_id: user.unwrap_or_else(|| self.default_user_id.clone()),
                };
                self.engine.approve(event).map(|_| ())
            }
            LifecycleCommand::Advance { external_refund_id } => {
                let refund = self.engine.refund_by_processor_id(&external_refund_id)?;
                self.engine.advance(refund.id).map(|_| ())
            }
            LifecycleCommand::MarkPosted { external_refund_id } => {
                let refund = self.engine.refund_by_processor_id(&external_refund_id)?;
                self.engine.mark_posted(refund.id).map(|_| ())
            }
            LifecycleCommand::BankCredit {
                amount_cents,
                external_refund_id,
            } => {
                let refund_id = match external_refund_id {
                    Some(external_refund_id) => {
                        Some(self.engine.refund_by_processor_id(&external_refund_id)?.id)
                    }
                    None => None,
                };
                self.engine
                    .record_bank_posting(&TransactionPosted {
                        matched_amount_cents: amount_cents,
                        refund_id,
                    })
                    .map(|_| ())
            }
            LifecycleCommand::Collect { external_refund_id } => {
                let refund = self.engine.refund_by_processor_id(&external_refund_id)?;
                self.engine.collect(refund.id).map(|_| ())
            }
            LifecycleCommand::MarkRecouped { external_refund_id } => {
                let refund = self.engine.refund_by_processor_id(&external_refund_id)?;
                self.engine.mark_recouped(refund.id).map(|_| ())
            }
            LifecycleCommand::Reconcile => self.engine.reconcile().map(|_| ()),
        }
    }

    /// Summaries of every refund, sorted by processor refund id
    pub fn summaries(&self) -> Result<Vec<RefundSummary>, RefundError> {
        let mut summaries = self
            .engine
            .list()?
            .into_iter()
            .map(|refund| self.engine.summary(refund.id))
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| {
            a.refund
                .processor_refund_id
                .cmp(&b.refund.processor_refund_id)
        });
        Ok(summaries)
    }
}
