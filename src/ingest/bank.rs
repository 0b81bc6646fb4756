//! Bank-data webhook ingestion
//!
//! The bank-data provider reports new transactions on the consumer's account.
//! Credits are turned into [`TransactionPosted`] signals; each transaction is
//! applied at most once, keyed by its provider transaction id.

use crate::core::lifecycle::RefundLifecycleEngine;
use crate::types::money::dollars_to_cents;
use crate::types::{OperationKey, RefundError, RefundId, TransactionPosted};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const TRANSACTIONS_WEBHOOK: &str = "TRANSACTIONS";
const DEFAULT_UPDATE: &str = "DEFAULT_UPDATE";

/// Bank-data webhook body
#[derive(Debug, Clone, Deserialize)]
pub struct BankWebhook {
    pub webhook_type: String,
    pub webhook_code: String,
    #[serde(default)]
    pub new_transactions: Vec<BankTransaction>,
}

/// One transaction reported by the bank-data provider
#[derive(Debug, Clone, Deserialize)]
pub struct BankTransaction {
    pub transaction_id: String,
    /// Dollar amount; credits are reported as negative values
    pub amount: Decimal,
    #[serde(default)]
    pub transaction_code: Option<String>,
    /// Engine refund id, when the transaction can be correlated explicitly
    #[serde(default)]
    pub refund_reference: Option<RefundId>,
}

impl BankTransaction {
    pub fn is_credit(&self) -> bool {
        self.transaction_code.as_deref() == Some("credit") || self.amount.is_sign_negative()
    }

    /// Absolute amount in cents
    pub fn amount_cents(&self) -> Option<i64> {
        dollars_to_cents(self.amount).and_then(i64::checked_abs)
    }
}

/// Result of handling one bank-data delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankWebhookOutcome {
    pub handled: bool,
    /// Refunds moved to `posted` by this delivery, including replays
    pub posted: Vec<RefundId>,
    /// Transactions already applied by an earlier delivery
    pub duplicates: usize,
}

/// Applies bank-data webhooks to the engine
#[derive(Clone)]
pub struct BankWebhookHandler {
    engine: RefundLifecycleEngine,
}

impl BankWebhookHandler {
    pub fn new(engine: RefundLifecycleEngine) -> Self {
        Self { engine }
    }

    /// Parse and apply a raw delivery
    pub fn handle(&self, body: &[u8]) -> Result<BankWebhookOutcome, RefundError> {
        let webhook: BankWebhook = serde_json::from_slice(body)
            .map_err(|e| RefundError::invalid_event(format!("malformed bank webhook: {}", e)))?;
        self.apply(&webhook)
    }

    /// Apply a parsed delivery
    ///
    /// Only `TRANSACTIONS`/`DEFAULT_UPDATE` deliveries are acted on. Debits
    /// are ignored. A transaction whose application fails is not marked done,
    /// so the delivery can be retried; the first failure is returned after the
    /// remaining transactions were attempted.
    pub fn apply(&self, webhook: &BankWebhook) -> Result<BankWebhookOutcome, RefundError> {
        if webhook.webhook_type != TRANSACTIONS_WEBHOOK || webhook.webhook_code != DEFAULT_UPDATE {
            info!(
                webhook_type = %webhook.webhook_type,
                webhook_code = %webhook.webhook_code,
                "unhandled bank webhook"
            );
            return Ok(BankWebhookOutcome::default());
        }

        let mut outcome = BankWebhookOutcome {
            handled: true,
            ..BankWebhookOutcome::default()
        };
        let mut first_error = None;

        for txn in webhook.new_transactions.iter().filter(|txn| txn.is_credit()) {
            let Some(amount_cents) = txn.amount_cents() else {
                warn!(transaction_id = %txn.transaction_id, "credit amount out of range");
                continue;
            };

            let signal = TransactionPosted {
                matched_amount_cents: amount_cents,
                refund_id: txn.refund_reference,
            };
            let key = OperationKey::BankTransaction(txn.transaction_id.clone()).to_string();
            let run = self.engine.guard().run_once(&key, || {
                let posted = self.engine.record_bank_posting(&signal)?;
                Ok(posted.into_iter().map(|refund| refund.id).collect::<Vec<_>>())
            });

            match run {
                Ok(run) => {
                    if run.already_ran {
                        debug!(transaction_id = %txn.transaction_id, "bank transaction already applied");
                        outcome.duplicates += 1;
                    }
                    outcome.posted.extend(run.result);
                }
                Err(e) => {
                    warn!(transaction_id = %txn.transaction_id, error = %e, "failed to apply bank credit");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}
