//! Refund lifecycle orchestration
//!
//! This module provides the `RefundLifecycleEngine`, which moves refunds through
//! their statuses and performs the money movement and bookkeeping each step
//! requires.
//!
//! # Design
//!
//! The engine owns no state of its own. Refund rows, ledger postings,
//! idempotency records, the transfer gateway and the payout destination
//! directory are injected as trait objects through [`Collaborators`], so the
//! engine runs unchanged against the in-memory stores of this crate or any
//! other implementation.
//!
//! # Architecture
//!
//! ```text
//! RefundLifecycleEngine
//!     ├── Arc<dyn RefundStore>          (refund rows, CAS status writes)
//!     ├── Arc<dyn LedgerStore>          (append-only postings)
//!     ├── IdempotencyGuard              (run-once wrapper over Arc<dyn IdempotencyStore>)
//!     ├── Arc<dyn TransferGateway>      (ACH credit/debit)
//!     └── Arc<dyn DestinationDirectory> (verified consumer destinations)
//! ```
//!
//! # Operation Shape
//!
//! Every operation re-reads the refund and validates its status, amount and
//! destination before anything else happens. Validation failures are returned
//! with no side effect. `advance` and `collect` then enter the idempotency
//! guard, which runs the transfer, the ledger batch and the status write at
//! most once per refund:
//!
//! ```text
//! load → validate → run_once(key) { transfer → ledger batch → CAS status } → reload
//! ```
//!
//! Ledger batches are deduplicated by operation key and status writes accept a
//! refund that already reached the target status, so the bookkeeping half can be
//! replayed safely by a retry or by [`reconcile`](crate::core::reconcile).
//!
//! # Thread Safety
//!
//! The engine is `Clone` and can be shared across threads and tasks. Two racing
//! calls that both pass validation are serialized by the idempotency guard, and
//! every status write is a compare-and-swap on the expected prior status.

use crate::core::destinations::MemoryDestinationDirectory;
use crate::core::fee::{calc_fee_cents, FeeBreakdown};
use crate::core::gateway::SimulatedGateway;
use crate::core::idempotency::{GuardPolicy, IdempotencyGuard};
use crate::core::idempotency_store::MemoryIdempotencyStore;
use crate::core::ledger_store::MemoryLedgerStore;
use crate::core::refund_store::MemoryRefundStore;
use crate::core::traits::{
    DestinationDirectory, DestinationStatus, IdempotencyStore, LedgerStore, PayoutDestination,
    RefundStore, StatusUpdate, TransferDirection, TransferGateway, TransferReceipt,
    TransferRequest,
};
use crate::types::{
    ledger_balance, LedgerBatch, LedgerEntry, LedgerEntryType, NewLedgerEntry, OperationKey,
    Refund, RefundApproved, RefundError, RefundId, RefundStatus, TransactionPosted,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Program funding source used when none is configured
pub const DEFAULT_PROGRAM_FUNDING_SOURCE: &str = "urn:funding-source:program-demo";

/// Stores and services the engine depends on
#[derive(Clone)]
pub struct Collaborators {
    pub refunds: Arc<dyn RefundStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub gateway: Arc<dyn TransferGateway>,
    pub destinations: Arc<dyn DestinationDirectory>,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Platform account credited from on advance and debited into on collect
    pub program_funding_source: String,
    pub guard_policy: GuardPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            program_funding_source: DEFAULT_PROGRAM_FUNDING_SOURCE.to_string(),
            guard_policy: GuardPolicy::default(),
        }
    }
}

/// The in-memory collaborators, kept concrete for inspection
///
/// The CLI drives the engine with these; tests use them to look at gateway
/// call counts and raw store contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    pub refunds: Arc<MemoryRefundStore>,
    pub ledger: Arc<MemoryLedgerStore>,
    pub idempotency: Arc<MemoryIdempotencyStore>,
    pub gateway: Arc<SimulatedGateway>,
    pub destinations: Arc<MemoryDestinationDirectory>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            refunds: self.refunds.clone(),
            ledger: self.ledger.clone(),
            idempotency: self.idempotency.clone(),
            gateway: self.gateway.clone(),
            destinations: self.destinations.clone(),
        }
    }

    /// Build an engine wired to this backend
    pub fn engine(&self, config: LifecycleConfig) -> RefundLifecycleEngine {
        RefundLifecycleEngine::new(self.collaborators(), config)
    }
}

/// Result of a guarded money movement (`advance` or `collect`)
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    /// Refund as stored after the operation
    pub refund: Refund,
    pub transfer_id: String,
    /// True when the transfer was executed by an earlier call
    pub already_ran: bool,
}

/// Refund detail view: the refund, its fee split and its ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundSummary {
    pub refund: Refund,
    pub fee: FeeBreakdown,
    pub balance_cents: i64,
    pub entries: Vec<LedgerEntry>,
}

/// Refund lifecycle state machine and orchestrator
#[derive(Clone)]
pub struct RefundLifecycleEngine {
    pub(crate) refunds: Arc<dyn RefundStore>,
    pub(crate) ledger: Arc<dyn LedgerStore>,
    pub(crate) idempotency: Arc<dyn IdempotencyStore>,
    pub(crate) gateway: Arc<dyn TransferGateway>,
    destinations: Arc<dyn DestinationDirectory>,
    guard: IdempotencyGuard,
    config: LifecycleConfig,
}

impl RefundLifecycleEngine {
    pub fn new(collaborators: Collaborators, config: LifecycleConfig) -> Self {
        let guard = IdempotencyGuard::new(collaborators.idempotency.clone(), config.guard_policy);
        Self {
            refunds: collaborators.refunds,
            ledger: collaborators.ledger,
            idempotency: collaborators.idempotency,
            gateway: collaborators.gateway,
            destinations: collaborators.destinations,
            guard,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// The run-once guard shared by engine operations and webhook ingestion
    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Register a verified payout destination for a consumer
    pub fn link_destination(&self, user_id: &str, funding_source: &str) -> Result<(), RefundError> {
        self.destinations.link(PayoutDestination {
            user_id: user_id.to_string(),
            funding_source: funding_source.to_string(),
            status: DestinationStatus::Verified,
        })?;
        info!(user_id, funding_source, "payout destination linked");
        Ok(())
    }

    /// Create or update a refund from a processor approval
    ///
    /// Refunds are keyed by their processor refund id: a redelivered event
    /// updates the existing row instead of creating a second one. Correlation
    /// fields and card metadata are refreshed while the refund is still
    /// `initiated` or `approved`; a refund that already moved on is left as is.
    /// The amount never changes after creation.
    ///
    /// # Errors
    ///
    /// * `RefundError::InvalidEvent` - The event carries no external refund id
    /// * `RefundError::InvalidAmount` - The amount is not positive
    /// * `RefundError::StoreFailure` - The refund store failed
    pub fn approve(&self, event: RefundApproved) -> Result<Refund, RefundError> {
        if event.external_refund_id.trim().is_empty() {
            return Err(RefundError::invalid_event(
                "refund approval without an external refund id",
            ));
        }
        if event.amount_cents <= 0 {
            return Err(RefundError::invalid_amount(
                &event.external_refund_id,
                event.amount_cents,
            ));
        }

        let mut candidate = Refund::approved(
            event.external_refund_id.clone(),
            event.user_id.clone(),
            event.amount_cents,
        );
        candidate.original_charge_id = event.charge_id.clone();
        candidate.card_last4 = event.card_last4.clone();
        candidate.merchant_id = event.merchant_ref.clone();

        let merge = |existing: &mut Refund| {
            if !matches!(
                existing.status,
                RefundStatus::Initiated | RefundStatus::Approved
            ) {
                debug!(
                    refund_id = %existing.id,
                    status = %existing.status,
                    "refund already past approval, event ignored"
                );
                return;
            }
            if existing.amount_cents != event.amount_cents {
                warn!(
                    refund_id = %existing.id,
                    stored_cents = existing.amount_cents,
                    received_cents = event.amount_cents,
                    "approval amount differs from stored amount, keeping stored amount"
                );
            }

            existing.status = RefundStatus::Approved;
            if event.charge_id.is_some() {
                existing.original_charge_id = event.charge_id.clone();
            }
            if event.card_last4.is_some() {
                existing.card_last4 = event.card_last4.clone();
            }
            if event.merchant_ref.is_some() {
                existing.merchant_id = event.merchant_ref.clone();
            }
        };

        let (refund, created) = self
            .refunds
            .upsert_by_processor_refund_id(candidate, &merge)?;
        info!(
            refund_id = %refund.id,
            external_refund_id = %refund.processor_refund_id,
            amount_cents = refund.amount_cents,
            status = %refund.status,
            created,
            "refund approval recorded"
        );
        Ok(refund)
    }

    /// Advance the refund amount to the consumer
    ///
    /// Credits the consumer's verified destination from the program funding
    /// source, books the `advance` and `fee` postings and moves the refund to
    /// `instant_sent`. All of it runs at most once per refund under the key
    /// `advance:<refundId>`.
    ///
    /// # Errors
    ///
    /// * `RefundError::NotFound` - No such refund
    /// * `RefundError::InvalidTransition` - The refund is not `approved`
    /// * `RefundError::InvalidAmount` - The amount is not positive
    /// * `RefundError::MissingDestination` - The consumer has no verified destination
    /// * `RefundError::GatewayFailure` - The transfer failed; safe to retry
    /// * `RefundError::StoreFailure` - Bookkeeping failed; safe to retry
    /// * `RefundError::InProgress` - A concurrent advance did not finish in time
    pub fn advance(&self, refund_id: RefundId) -> Result<TransferOutcome, RefundError> {
        let refund = self.load(refund_id)?;
        require_status(&refund, &[RefundStatus::Approved], "advance")?;
        require_positive_amount(&refund)?;
        let destination = self.verified_destination(&refund.user_id)?;

        let key = OperationKey::Advance(refund.id).to_string();
        let request = TransferRequest {
            source: self.config.program_funding_source.clone(),
            destination: destination.funding_source,
            amount_cents: refund.amount_cents,
            direction: TransferDirection::Credit,
            idempotency_key: key.clone(),
        };

        let run = self.guard.run_once(&key, || {
            let receipt = self.transfer(&request)?;
            self.book_advance(&refund, &receipt)?;
            Ok(receipt)
        })?;

        let refund = self.load(refund_id)?;
        info!(
            refund_id = %refund.id,
            transfer_id = %run.result.transfer_id,
            amount_cents = refund.amount_cents,
            already_ran = run.already_ran,
            "refund advanced"
        );
        Ok(TransferOutcome {
            refund,
            transfer_id: run.result.transfer_id,
            already_ran: run.already_ran,
        })
    }

    /// Mark an advanced refund as posted at the consumer's bank
    ///
    /// # Errors
    ///
    /// * `RefundError::NotFound` - No such refund
    /// * `RefundError::InvalidTransition` - The refund is not `instant_sent`
    pub fn mark_posted(&self, refund_id: RefundId) -> Result<Refund, RefundError> {
        let refund = self.load(refund_id)?;
        require_status(&refund, &[RefundStatus::InstantSent], "post")?;

        let posted = self.write_status(
            refund.id,
            &[RefundStatus::InstantSent],
            RefundStatus::Posted,
            Some(Utc::now()),
            "post",
        )?;
        info!(refund_id = %posted.id, "refund posted");
        Ok(posted)
    }

    /// Collect the advance back from the consumer
    ///
    /// Debits the consumer's verified destination into the program funding
    /// source, books the `repayment` posting and moves the refund to `recouped`.
    /// Accepted from `posted` and from `instant_sent` (the bank posting was not
    /// observed). Runs at most once per refund under `collect:<refundId>`.
    ///
    /// # Errors
    ///
    /// Same classification as [`advance`](Self::advance), with
    /// `InvalidTransition` for any status other than `posted` or `instant_sent`.
    pub fn collect(&self, refund_id: RefundId) -> Result<TransferOutcome, RefundError> {
        let refund = self.load(refund_id)?;
        require_status(
            &refund,
            &[RefundStatus::Posted, RefundStatus::InstantSent],
            "collect",
        )?;
        require_positive_amount(&refund)?;
        let destination = self.verified_destination(&refund.user_id)?;

        let key = OperationKey::Collect(refund.id).to_string();
        let request = TransferRequest {
            source: destination.funding_source,
            destination: self.config.program_funding_source.clone(),
            amount_cents: refund.amount_cents,
            direction: TransferDirection::Debit,
            idempotency_key: key.clone(),
        };

        let run = self.guard.run_once(&key, || {
            let receipt = self.transfer(&request)?;
            self.book_collect(&refund, &receipt)?;
            Ok(receipt)
        })?;

        let refund = self.load(refund_id)?;
        info!(
            refund_id = %refund.id,
            transfer_id = %run.result.transfer_id,
            amount_cents = refund.amount_cents,
            already_ran = run.already_ran,
            "refund collected"
        );
        Ok(TransferOutcome {
            refund,
            transfer_id: run.result.transfer_id,
            already_ran: run.already_ran,
        })
    }

    /// Mark a posted refund as recouped without a debit
    ///
    /// Used when the advance was recovered out of band. An `adjustment` of
    /// `-amount` is booked so the refund's balance settles at its fee, as it
    /// does after `collect`.
    ///
    /// The ledger still sums to the fee once the refund is `recouped`.
    ///
    /// # Errors
    ///
    /// * `RefundError::NotFound` - No such refund
    /// * `RefundError::InvalidTransition` - The refund is not `posted`
    pub fn mark_recouped(&self, refund_id: RefundId) -> Result<Refund, RefundError> {
        let refund = self.load(refund_id)?;
        require_status(&refund, &[RefundStatus::Posted], "recoup")?;

        // Only the caller that wins the status write books the adjustment; a
        // refund recouped by `collect` already carries its repayment
        let recouped = match self.refunds.compare_and_set_status(
            refund.id,
            &[RefundStatus::Posted],
            RefundStatus::Recouped,
            None,
        )? {
            StatusUpdate::Applied(recouped) => recouped,
            StatusUpdate::Mismatch(current) => {
                return Err(RefundError::invalid_transition(
                    current.id,
                    current.status,
                    "recoup",
                ))
            }
            StatusUpdate::Missing => return Err(RefundError::refund_not_found(refund.id)),
        };
        self.book_recoup_adjustment(&recouped)?;
        info!(refund_id = %recouped.id, "refund marked recouped");
        Ok(recouped)
    }

    /// Apply a bank posting signal
    ///
    /// A signal correlated to a refund posts exactly that refund. Otherwise every
    /// `instant_sent` refund whose amount equals the credit is posted; two
    /// outstanding advances of the same amount cannot be told apart this way.
    /// Returns the refunds that were posted.
    pub fn record_bank_posting(&self, signal: &TransactionPosted) -> Result<Vec<Refund>, RefundError> {
        if let Some(refund_id) = signal.refund_id {
            let refund = self.load(refund_id)?;
            if refund.amount_cents != signal.matched_amount_cents {
                warn!(
                    refund_id = %refund.id,
                    refund_cents = refund.amount_cents,
                    credit_cents = signal.matched_amount_cents,
                    "correlated bank credit differs from refund amount"
                );
            }
            return self.mark_posted(refund_id).map(|posted| vec![posted]);
        }

        let mut candidates: Vec<Refund> = self
            .refunds
            .list_by_status(RefundStatus::InstantSent)?
            .into_iter()
            .filter(|refund| refund.amount_cents == signal.matched_amount_cents)
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        match candidates.len() {
            0 => {
                debug!(
                    amount_cents = signal.matched_amount_cents,
                    "bank credit matches no advanced refund"
                );
                return Ok(Vec::new());
            }
            1 => {}
            count => warn!(
                amount_cents = signal.matched_amount_cents,
                count,
                "bank credit matches several advanced refunds, posting all of them"
            ),
        }

        let mut posted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.mark_posted(candidate.id) {
                Ok(refund) => posted.push(refund),
                Err(RefundError::InvalidTransition { status, .. }) => {
                    debug!(refund_id = %candidate.id, %status, "refund moved on before it could be posted");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(posted)
    }

    /// Look up a refund
    pub fn refund(&self, refund_id: RefundId) -> Result<Refund, RefundError> {
        self.load(refund_id)
    }

    /// Look up a refund by its processor refund id
    pub fn refund_by_processor_id(&self, external_refund_id: &str) -> Result<Refund, RefundError> {
        self.refunds
            .find_by_processor_refund_id(external_refund_id)?
            .ok_or_else(|| RefundError::refund_not_found(external_refund_id))
    }

    /// Postings of a refund in insertion order
    pub fn ledger(&self, refund_id: RefundId) -> Result<Vec<LedgerEntry>, RefundError> {
        let refund = self.load(refund_id)?;
        Ok(self.ledger.entries_for(refund.id)?)
    }

    /// Refund with its fee split, ledger and running balance
    pub fn summary(&self, refund_id: RefundId) -> Result<RefundSummary, RefundError> {
        let refund = self.load(refund_id)?;
        let entries = self.ledger.entries_for(refund.id)?;
        Ok(RefundSummary {
            fee: FeeBreakdown::for_amount(refund.amount_cents),
            balance_cents: ledger_balance(&entries),
            refund,
            entries,
        })
    }

    /// All refunds, oldest first
    pub fn list(&self) -> Result<Vec<Refund>, RefundError> {
        let mut refunds = self.refunds.list()?;
        refunds.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.processor_refund_id.cmp(&b.processor_refund_id))
        });
        Ok(refunds)
    }

    /// Book the advance and fee postings, then move to `instant_sent`
    pub(crate) fn book_advance(&self, refund: &Refund, receipt: &TransferReceipt) -> Result<Refund, RefundError> {
        let reference = OperationKey::Advance(refund.id).to_string();
        let transfer_id = Some(receipt.transfer_id.clone());
        let (_, written) = self.ledger.append(LedgerBatch {
            refund_id: refund.id,
            reference,
            entries: vec![
                NewLedgerEntry::new(
                    LedgerEntryType::Advance,
                    refund.amount_cents,
                    transfer_id.clone(),
                ),
                NewLedgerEntry::new(
                    LedgerEntryType::Fee,
                    calc_fee_cents(refund.amount_cents),
                    transfer_id,
                ),
            ],
        })?;
        if !written {
            debug!(refund_id = %refund.id, "advance postings already booked");
        }

        self.write_status(
            refund.id,
            &[RefundStatus::Approved],
            RefundStatus::InstantSent,
            None,
            "advance",
        )
    }

    /// Book the repayment posting, then move to `recouped`
    pub(crate) fn book_collect(&self, refund: &Refund, receipt: &TransferReceipt) -> Result<Refund, RefundError> {
        let (_, written) = self.ledger.append(LedgerBatch {
            refund_id: refund.id,
            reference: OperationKey::Collect(refund.id).to_string(),
            entries: vec![NewLedgerEntry::new(
                LedgerEntryType::Repayment,
                -refund.amount_cents,
                Some(receipt.transfer_id.clone()),
            )],
        })?;
        if !written {
            debug!(refund_id = %refund.id, "repayment posting already booked");
        }

        self.write_status(
            refund.id,
            &[RefundStatus::Posted, RefundStatus::InstantSent],
            RefundStatus::Recouped,
            None,
            "collect",
        )
    }

    pub(crate) fn book_recoup_adjustment(&self, refund: &Refund) -> Result<bool, RefundError> {
        let (_, written) = self.ledger.append(LedgerBatch {
            refund_id: refund.id,
            reference: OperationKey::Recoup(refund.id).to_string(),
            entries: vec![NewLedgerEntry::new(
                LedgerEntryType::Adjustment,
                -refund.amount_cents,
                None,
            )],
        })?;
        Ok(written)
    }

    fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, RefundError> {
        self.gateway.initiate_transfer(request).map_err(|e| {
            warn!(
                key = %request.idempotency_key,
                direction = ?request.direction,
                error = %e,
                "transfer failed"
            );
            RefundError::from(e)
        })
    }

    /// Compare-and-swap the status
    ///
    /// A refund that already holds `next` (or a later status) counts as
    /// success, since the same bookkeeping was completed by someone else.
    fn write_status(
        &self,
        refund_id: RefundId,
        expected: &[RefundStatus],
        next: RefundStatus,
        posted_at: Option<DateTime<Utc>>,
        operation: &str,
    ) -> Result<Refund, RefundError> {
        match self
            .refunds
            .compare_and_set_status(refund_id, expected, next, posted_at)?
        {
            StatusUpdate::Applied(refund) => Ok(refund),
            StatusUpdate::Mismatch(refund) if refund.status == next => Ok(refund),
            StatusUpdate::Mismatch(refund) if next != RefundStatus::Posted && refund.status > next => {
                Ok(refund)
            }
            StatusUpdate::Mismatch(refund) => Err(RefundError::invalid_transition(
                refund.id,
                refund.status,
                operation,
            )),
            StatusUpdate::Missing => Err(RefundError::refund_not_found(refund_id)),
        }
    }

    fn load(&self, refund_id: RefundId) -> Result<Refund, RefundError> {
        self.refunds
            .get(refund_id)?
            .ok_or_else(|| RefundError::refund_not_found(refund_id))
    }

    fn verified_destination(&self, user_id: &str) -> Result<PayoutDestination, RefundError> {
        self.destinations
            .verified_destination(user_id)?
            .ok_or_else(|| {
                warn!(user_id, "no verified payout destination");
                RefundError::missing_destination(user_id)
            })
    }
}

fn require_status(refund: &Refund, allowed: &[RefundStatus], operation: &str) -> Result<(), RefundError> {
    if allowed.contains(&refund.status) {
        return Ok(());
    }
    warn!(
        refund_id = %refund.id,
        status = %refund.status,
        operation,
        "operation rejected in current status"
    );
    Err(RefundError::invalid_transition(
        refund.id,
        refund.status,
        operation,
    ))
}

fn require_positive_amount(refund: &Refund) -> Result<(), RefundError> {
    if refund.amount_cents > 0 {
        Ok(())
    } else {
        Err(RefundError::invalid_amount(refund.id, refund.amount_cents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved_refund(engine: &RefundLifecycleEngine, amount_cents: i64) -> Refund {
        engine
            .approve(RefundApproved {
                external_refund_id: "re_1".to_string(),
                charge_id: Some("ch_1".to_string()),
                amount_cents,
                card_last4: Some("4242".to_string()),
                merchant_ref: Some("Acme".to_string()),
                user_id: "user-1".to_string(),
            })
            .unwrap()
    }

    fn setup() -> (InMemoryBackend, RefundLifecycleEngine) {
        let backend = InMemoryBackend::new();
        let engine = backend.engine(LifecycleConfig::default());
        engine.link_destination("user-1", "urn:funding-source:user-1").unwrap();
        (backend, engine)
    }

    #[test]
    fn test_approve_creates_refund() {
        let (_, engine) = setup();
        let refund = approved_refund(&engine, 4200);

        assert_eq!(refund.status, RefundStatus::Approved);
        assert_eq!(refund.card_last4.as_deref(), Some("4242"));
        assert_eq!(refund.merchant_id.as_deref(), Some("Acme"));
        assert_eq!(engine.refund_by_processor_id("re_1").unwrap(), refund);
    }

    #[test]
    fn test_approve_rejects_missing_external_id() {
        let (_, engine) = setup();
        let result = engine.approve(RefundApproved {
            external_refund_id: " ".to_string(),
            charge_id: None,
            amount_cents: 4200,
            card_last4: None,
            merchant_ref: None,
            user_id: "user-1".to_string(),
        });
        assert!(matches!(result, Err(RefundError::InvalidEvent { .. })));
    }

    #[test]
    fn test_advance_credits_from_program_source() {
        let (backend, engine) = setup();
        let refund = approved_refund(&engine, 4200);

        let outcome = engine.advance(refund.id).unwrap();

        let transfer = backend
            .gateway
            .transfer(&format!("advance:{}", refund.id))
            .unwrap();
        assert_eq!(transfer.transfer_id, outcome.transfer_id);
        assert_eq!(transfer.request.direction, TransferDirection::Credit);
        assert_eq!(transfer.request.source, DEFAULT_PROGRAM_FUNDING_SOURCE);
        assert_eq!(transfer.request.destination, "urn:funding-source:user-1");
        assert_eq!(outcome.refund.status, RefundStatus::InstantSent);
    }

    #[test]
    fn test_collect_debits_into_program_source() {
        let (backend, engine) = setup();
        let refund = approved_refund(&engine, 4200);
        engine.advance(refund.id).unwrap();

        engine.collect(refund.id).unwrap();

        let transfer = backend
            .gateway
            .transfer(&format!("collect:{}", refund.id))
            .unwrap();
        assert_eq!(transfer.request.direction, TransferDirection::Debit);
        assert_eq!(transfer.request.source, "urn:funding-source:user-1");
        assert_eq!(transfer.request.destination, DEFAULT_PROGRAM_FUNDING_SOURCE);
    }

    #[test]
    fn test_summary_reports_fee_and_balance() {
        let (_, engine) = setup();
        let refund = approved_refund(&engine, 4200);
        engine.advance(refund.id).unwrap();

        let summary = engine.summary(refund.id).unwrap();

        assert_eq!(summary.fee.fee_cents, 226);
        assert_eq!(summary.balance_cents, 4426);
        assert_eq!(summary.entries.len(), 2);
    }

    #[test]
    fn test_unknown_refund_is_not_found() {
        let (_, engine) = setup();
        let id = uuid::Uuid::new_v4();
        assert_eq!(engine.refund(id), Err(RefundError::refund_not_found(id)));
        assert!(matches!(engine.ledger(id), Err(RefundError::NotFound { .. })));
    }
}
