//! Thread-safe in-memory ledger
//!
//! The `MemoryLedgerStore` keeps each refund's postings in a `DashMap` entry.
//! A batch is appended while holding that entry's lock, which makes the batch
//! atomic (all of its postings or none) and lets the store refuse a second
//! batch with the same reference. Entries are never updated or removed.

use crate::core::traits::LedgerStore;
use crate::types::{Currency, LedgerBatch, LedgerEntry, RefundId, StoreError};
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Append-only ledger keyed by refund
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: DashMap<RefundId, Vec<LedgerEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of postings across all refunds
    pub fn entry_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append(&self, batch: LedgerBatch) -> Result<(Vec<LedgerEntry>, bool), StoreError> {
        let mut postings = self.entries.entry(batch.refund_id).or_default();

        let existing: Vec<LedgerEntry> = postings
            .iter()
            .filter(|entry| entry.reference == batch.reference)
            .cloned()
            .collect();
        if !existing.is_empty() {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let stored: Vec<LedgerEntry> = batch
            .entries
            .into_iter()
            .map(|entry| LedgerEntry {
                id: Uuid::new_v4(),
                refund_id: batch.refund_id,
                entry_type: entry.entry_type,
                amount_cents: entry.amount_cents,
                currency: Currency::Usd,
                reference: batch.reference.clone(),
                transfer_id: entry.transfer_id,
                created_at: now,
            })
            .collect();

        postings.extend(stored.iter().cloned());
        Ok((stored, true))
    }

    fn entries_for(&self, refund_id: RefundId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .entries
            .get(&refund_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
