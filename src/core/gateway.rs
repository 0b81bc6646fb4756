//! Simulated ACH transfer gateway
//!
//! `SimulatedGateway` stands in for the transfer provider. It behaves like a
//! provider that honors idempotency keys: a second instruction under a key it
//! has already executed returns the original transfer instead of moving money
//! again. Failures can be injected to exercise the engine's retry paths.

use crate::core::traits::{TransferGateway, TransferReceipt, TransferRequest};
use crate::types::GatewayError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use uuid::Uuid;

/// A transfer the simulated provider executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransfer {
    pub transfer_id: String,
    pub request: TransferRequest,
}

/// In-memory transfer provider
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    /// Executed transfers by idempotency key
    transfers: DashMap<String, SimulatedTransfer>,

    /// Number of `initiate_transfer` calls, including rejected ones
    calls: AtomicUsize,

    /// Upcoming calls that fail with a transport error
    failures_remaining: AtomicUsize,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `initiate_transfer` fail
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of distinct transfers executed
    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    pub fn transfer(&self, idempotency_key: &str) -> Option<SimulatedTransfer> {
        self.transfers
            .get(idempotency_key)
            .map(|entry| entry.value().clone())
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl TransferGateway for SimulatedGateway {
    fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.take_injected_failure() {
            return Err(GatewayError::Transport {
                message: "simulated provider outage".to_string(),
            });
        }
        if request.amount_cents <= 0 {
            return Err(GatewayError::Rejected {
                status: 400,
                message: format!("amount must be positive, got {}", request.amount_cents),
            });
        }

        let transfer = match self.transfers.entry(request.idempotency_key.clone()) {
            Entry::Occupied(existing) => {
                debug!(key = %request.idempotency_key, "provider deduplicated transfer");
                existing.get().clone()
            }
            Entry::Vacant(vacant) => {
                let transfer = SimulatedTransfer {
                    transfer_id: format!("urn:transfer:{}", Uuid::new_v4()),
                    request: request.clone(),
                };
                vacant.insert(transfer.clone());
                transfer
            }
        };

        Ok(TransferReceipt {
            transfer_id: transfer.transfer_id,
        })
    }

    fn find_transfer(&self, idempotency_key: &str) -> Result<Option<TransferReceipt>, GatewayError> {
        Ok(self.transfer(idempotency_key).map(|transfer| TransferReceipt {
            transfer_id: transfer.transfer_id,
        }))
    }
}
