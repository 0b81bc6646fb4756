//! Reconciliation of transfers with bookkeeping
//!
//! A transfer and the bookkeeping that follows it cannot be committed
//! atomically: the gateway may execute a transfer and the process fail before
//! the ledger batch or the status write lands. The reconciliation pass finds
//! refunds whose status still precedes a transfer the gateway reports as
//! executed and finishes their bookkeeping. Every step it takes is idempotent,
//! so it can run at any time, repeatedly, and concurrently with live traffic.

use crate::core::lifecycle::RefundLifecycleEngine;
use crate::core::traits::TransferReceipt;
use crate::types::{
    IdempotencyStatus, LedgerEntryType, OperationKey, Refund, RefundError, RefundStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// What a reconciliation pass repaired
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Refunds inspected
    pub scanned: usize,
    /// `approved` refunds whose executed advance was booked
    pub advances_repaired: usize,
    /// `instant_sent`/`posted` refunds whose executed collection was booked
    pub collections_repaired: usize,
    /// `recouped` refunds missing their out-of-band recovery adjustment
    pub adjustments_repaired: usize,
}

impl ReconcileReport {
    pub fn repaired(&self) -> usize {
        self.advances_repaired + self.collections_repaired + self.adjustments_repaired
    }
}

impl RefundLifecycleEngine {
    /// Complete bookkeeping for transfers that executed without it
    pub fn reconcile(&self) -> Result<ReconcileReport, RefundError> {
        let mut report = ReconcileReport::default();

        for refund in self.refunds.list()? {
            report.scanned += 1;
            match refund.status {
                RefundStatus::Approved => {
                    let key = OperationKey::Advance(refund.id).to_string();
                    if let Some(receipt) = self.gateway.find_transfer(&key)? {
                        self.book_advance(&refund, &receipt)?;
                        self.settle_record(&key, &receipt);
                        warn!(refund_id = %refund.id, transfer_id = %receipt.transfer_id, "repaired unbooked advance");
                        report.advances_repaired += 1;
                    }
                }
                RefundStatus::InstantSent | RefundStatus::Posted => {
                    let key = OperationKey::Collect(refund.id).to_string();
                    if let Some(receipt) = self.gateway.find_transfer(&key)? {
                        self.book_collect(&refund, &receipt)?;
                        self.settle_record(&key, &receipt);
                        warn!(refund_id = %refund.id, transfer_id = %receipt.transfer_id, "repaired unbooked collection");
                        report.collections_repaired += 1;
                    }
                }
                RefundStatus::Recouped => {
                    if self.missing_recovery(&refund)? && self.book_recoup_adjustment(&refund)? {
                        warn!(refund_id = %refund.id, "repaired missing recoup adjustment");
                        report.adjustments_repaired += 1;
                    }
                }
                RefundStatus::Initiated => {}
            }
        }

        info!(
            scanned = report.scanned,
            repaired = report.repaired(),
            "reconciliation finished"
        );
        Ok(report)
    }

    // Recouped without a collection means the demo recoup transition won but its
    // adjustment was never written
    fn missing_recovery(&self, refund: &Refund) -> Result<bool, RefundError> {
        let entries = self.ledger.entries_for(refund.id)?;
        let advanced = entries
            .iter()
            .any(|entry| entry.entry_type == LedgerEntryType::Advance);
        let recovered = entries.iter().any(|entry| {
            matches!(
                entry.entry_type,
                LedgerEntryType::Repayment | LedgerEntryType::Adjustment
            )
        });
        let collected = self
            .gateway
            .find_transfer(&OperationKey::Collect(refund.id).to_string())?
            .is_some();
        Ok(advanced && !recovered && !collected)
    }

    /// Mark a stuck idempotency record completed with the gateway's receipt
    fn settle_record(&self, key: &str, receipt: &TransferReceipt) {
        let record = match self.idempotency.get(key) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                error!(key, error = %e, "failed to read idempotency record");
                return;
            }
        };
        if record.status == IdempotencyStatus::Completed {
            return;
        }

        let result = serde_json::to_value(receipt)
            .map_err(|e| e.to_string())
            .and_then(|body| self.idempotency.complete(key, body).map_err(|e| e.to_string()));
        if let Err(e) = result {
            error!(key, error = %e, "failed to complete idempotency record");
        }
    }
}
