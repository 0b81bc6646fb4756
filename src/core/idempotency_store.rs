//! Thread-safe in-memory idempotency records
//!
//! `MemoryIdempotencyStore` keeps one record per key in a `DashMap`. Claiming a
//! key goes through the map's entry API, so the existence check and the insert
//! are a single uniqueness-enforcing write: of N concurrent claims on a fresh
//! key exactly one succeeds and the rest observe [`StoreError::Conflict`].

use crate::core::traits::IdempotencyStore;
use crate::types::{IdempotencyRecord, IdempotencyStatus, StoreError};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory idempotency store
#[derive(Debug, Default)]
pub struct MemoryIdempotencyStore {
    records: DashMap<String, IdempotencyRecord>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in no particular order
    pub fn records(&self) -> Vec<IdempotencyRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn update<F>(&self, key: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut IdempotencyRecord),
    {
        match self.records.get_mut(key) {
            Some(mut entry) => {
                let record = entry.value_mut();
                f(record);
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::Unavailable {
                message: format!("idempotency record {} does not exist", key),
            }),
        }
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    fn insert_in_progress(&self, key: &str) -> Result<IdempotencyRecord, StoreError> {
        match self.records.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let record = IdempotencyRecord::in_progress(key);
                vacant.insert(record.clone());
                Ok(record)
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.status != IdempotencyStatus::Failed {
                    return Err(StoreError::Conflict {
                        key: key.to_string(),
                    });
                }

                // A new attempt supersedes the failed one
                record.status = IdempotencyStatus::InProgress;
                record.attempts += 1;
                record.updated_at = Utc::now();
                Ok(record.clone())
            }
        }
    }

    fn complete(&self, key: &str, response: serde_json::Value) -> Result<(), StoreError> {
        self.update(key, |record| {
            if record.status == IdempotencyStatus::Completed {
                return;
            }
            record.status = IdempotencyStatus::Completed;
            record.response_body = Some(response);
            record.error_message = None;
        })
    }

    fn mark_failed(&self, key: &str, error: &str) -> Result<(), StoreError> {
        self.update(key, |record| {
            // A completed result is final
            if record.status == IdempotencyStatus::Completed {
                return;
            }
            record.status = IdempotencyStatus::Failed;
            record.error_message = Some(error.to_string());
        })
    }
}
