//! Run-once guard for side-effecting operations
//!
//! This module provides the `IdempotencyGuard`, which wraps an operation so it
//! executes at most once per idempotency key, no matter how many times (or how
//! concurrently) it is requested.
//!
//! # Replay Policy
//!
//! | Record at lookup | Behavior |
//! |---|---|
//! | none | claim `in_progress`, run, store `completed` with the result |
//! | `completed` | return the captured result without running |
//! | `in_progress` | poll until `completed` (replay) or `failed` (claim again) |
//! | `failed` | claim again and run |
//!
//! A caller that loses the claim race (the store reports `Conflict`) follows
//! the `in_progress` row. Waiting is bounded by [`GuardPolicy::in_progress_wait`];
//! a caller that runs out of time gets the retry-safe
//! [`RefundError::InProgress`].
//!
//! There is no policy under which a `completed` key runs again.

use crate::core::traits::IdempotencyStore;
use crate::types::{IdempotencyRecord, IdempotencyStatus, RefundError, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Tuning for callers that find a key held by someone else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// How long to wait for an in-progress key before giving up
    pub in_progress_wait: Duration,

    /// Delay between polls of an in-progress key
    pub poll_interval: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            in_progress_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(25),
        }
    }
}

/// Outcome of [`IdempotencyGuard::run_once`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunOnce<T> {
    /// True when the result was replayed from an earlier run
    pub already_ran: bool,
    pub result: T,
}

/// At-most-once executor keyed by opaque strings
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    policy: GuardPolicy,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, policy: GuardPolicy) -> Self {
        Self { store, policy }
    }

    /// Run `operation` unless `key` already ran
    ///
    /// The operation's result is captured as JSON, so replays hand back an
    /// equal value to every caller. Errors from `operation` are returned
    /// unchanged and leave the key `failed`.
    pub fn run_once<T, F>(&self, key: &str, operation: F) -> Result<RunOnce<T>, RefundError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, RefundError>,
    {
        let deadline = Instant::now() + self.policy.in_progress_wait;

        loop {
            match self.store.insert_in_progress(key) {
                Ok(record) => return self.execute(record, operation),
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            match self.store.get(key)? {
                Some(record) if record.status == IdempotencyStatus::Completed => {
                    debug!(key, "replaying completed operation");
                    return replay(record);
                }
                // The holder gave up; claim it on the next iteration
                Some(record) if record.status == IdempotencyStatus::Failed => continue,
                _ => {}
            }

            if Instant::now() >= deadline {
                warn!(key, "gave up waiting for in-progress operation");
                return Err(RefundError::InProgress {
                    key: key.to_string(),
                });
            }
            thread::sleep(self.policy.poll_interval);
        }
    }

    fn execute<T, F>(&self, record: IdempotencyRecord, operation: F) -> Result<RunOnce<T>, RefundError>
    where
        T: Serialize,
        F: FnOnce() -> Result<T, RefundError>,
    {
        let key = record.key.as_str();
        debug!(key, attempt = record.attempts, "running guarded operation");

        match operation() {
            Ok(result) => {
                match serde_json::to_value(&result) {
                    Ok(body) => {
                        // The effect already happened; a bookkeeping failure here
                        // is left for reconciliation rather than reported as an error
                        if let Err(e) = self.store.complete(key, body) {
                            error!(key, error = %e, "failed to mark operation completed");
                        }
                    }
                    Err(e) => error!(key, error = %e, "failed to capture operation result"),
                }
                Ok(RunOnce {
                    already_ran: false,
                    result,
                })
            }
            Err(err) => {
                if let Err(e) = self.store.mark_failed(key, &err.to_string()) {
                    error!(key, error = %e, "failed to mark operation failed");
                }
                Err(err)
            }
        }
    }
}

fn replay<T: DeserializeOwned>(record: IdempotencyRecord) -> Result<RunOnce<T>, RefundError> {
    let body = record.response_body.unwrap_or(serde_json::Value::Null);
    let result = serde_json::from_value(body).map_err(|e| {
        RefundError::store_failure(format!(
            "captured result for {} is unreadable: {}",
            record.key, e
        ))
    })?;
    Ok(RunOnce {
        already_ran: true,
        result,
    })
}
