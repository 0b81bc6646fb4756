//! Thread-safe in-memory refund storage
//!
//! This module provides the `MemoryRefundStore` struct, which stores refund rows
//! using concurrent data structures to enable safe multi-threaded access.
//!
//! # Design
//!
//! Refunds live in a `DashMap` keyed by refund id, with a secondary `DashMap`
//! indexing rows by processor refund id. Status writes are compare-and-swap
//! operations executed while holding the row's shard lock, so two racing
//! callers can never both move a refund out of the same status.
//!
//! # Lock Ordering
//!
//! Upserts lock the external-id index entry first and the refund row second.
//! Status writes only lock the refund row. No path locks them in the opposite
//! order.

use crate::core::traits::{RefundStore, StatusUpdate};
use crate::types::{Refund, RefundId, RefundStatus, StoreError};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Thread-safe refund store
#[derive(Debug, Default)]
pub struct MemoryRefundStore {
    /// Refund rows by engine id
    refunds: DashMap<RefundId, Refund>,

    /// Engine id by processor refund id
    by_processor_refund_id: DashMap<String, RefundId>,
}

impl MemoryRefundStore {
    /// Create a new empty MemoryRefundStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored refunds
    pub fn len(&self) -> usize {
        self.refunds.len()
    }

    /// Whether the store holds no refunds
    pub fn is_empty(&self) -> bool {
        self.refunds.is_empty()
    }
}

impl RefundStore for MemoryRefundStore {
    fn get(&self, id: RefundId) -> Result<Option<Refund>, StoreError> {
        Ok(self.refunds.get(&id).map(|entry| entry.value().clone()))
    }

    fn find_by_processor_refund_id(&self, external_id: &str) -> Result<Option<Refund>, StoreError> {
        let id = match self.by_processor_refund_id.get(external_id) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.get(id)
    }

    fn list_by_status(&self, status: RefundStatus) -> Result<Vec<Refund>, StoreError> {
        Ok(self
            .refunds
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn list(&self) -> Result<Vec<Refund>, StoreError> {
        Ok(self
            .refunds
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn upsert_by_processor_refund_id(
        &self,
        candidate: Refund,
        merge: &dyn Fn(&mut Refund),
    ) -> Result<(Refund, bool), StoreError> {
        // Holding the index entry serializes upserts of the same external id
        match self
            .by_processor_refund_id
            .entry(candidate.processor_refund_id.clone())
        {
            Entry::Occupied(index) => {
                let id = *index.get();
                let mut row = self.refunds.get_mut(&id).ok_or_else(|| StoreError::Unavailable {
                    message: format!("index points at missing refund {}", id),
                })?;
                merge(row.value_mut());
                Ok((row.value().clone(), false))
            }
            Entry::Vacant(index) => {
                let stored = candidate.clone();
                self.refunds.insert(candidate.id, candidate);
                index.insert(stored.id);
                Ok((stored, true))
            }
        }
    }

    fn compare_and_set_status(
        &self,
        id: RefundId,
        expected: &[RefundStatus],
        next: RefundStatus,
        posted_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdate, StoreError> {
        let mut row = match self.refunds.get_mut(&id) {
            Some(row) => row,
            None => return Ok(StatusUpdate::Missing),
        };

        let refund = row.value_mut();
        if !expected.contains(&refund.status) {
            return Ok(StatusUpdate::Mismatch(refund.clone()));
        }

        refund.status = next;
        if posted_at.is_some() {
            refund.posted_at = posted_at;
        }
        Ok(StatusUpdate::Applied(refund.clone()))
    }
}
