//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `refund`: Refund record, identifiers and lifecycle status
//! - `ledger`: Ledger postings and balances
//! - `idempotency`: Idempotency records and operation keys
//! - `event`: Typed inbound lifecycle signals
//! - `command`: Lifecycle commands replayed from scripts
//! - `money`: Cents/dollars conversions
//! - `error`: Error types for the engine and its collaborators

pub mod command;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod ledger;
pub mod money;
pub mod refund;

pub use command::LifecycleCommand;
pub use error::{GatewayError, RefundError, StoreError};
pub use event::{RefundApproved, TransactionPosted};
pub use idempotency::{IdempotencyRecord, IdempotencyStatus, OperationKey};
pub use ledger::{
    ledger_balance, Currency, LedgerBatch, LedgerEntry, LedgerEntryType, NewLedgerEntry,
};
pub use refund::{Refund, RefundId, RefundStatus, UserId};
