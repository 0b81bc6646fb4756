//! Refund Advance Engine Library
//!
//! # Overview
//!
//! Consumers are paid a card refund the moment the processor approves it,
//! instead of waiting days for it to settle on their card. The engine advances
//! the refund amount over ACH, watches for the real refund to land at the
//! consumer's bank and then collects the advance back. A fee is charged on top.
//!
//! # Architecture
//!
//! - [`types`] - Refunds, ledger entries, idempotency records, errors
//! - [`core`] - Business logic:
//!   - [`core::lifecycle`] - The lifecycle engine (approve, advance, post, collect, recoup)
//!   - [`core::idempotency`] - At-most-once execution of side-effecting operations
//!   - [`core::reconcile`] - Repair of bookkeeping left behind by interrupted operations
//!   - [`core::fee`] - Fee calculation
//!   - in-memory stores, a simulated transfer gateway and a destination directory
//! - [`ingest`] - Processor and bank-data webhook adapters, signature verification
//! - [`io`] - Command script parsing and refund summary output
//! - [`strategy`] - Sync and async script replay
//! - [`config`] - Environment configuration
//! - [`cli`] - Command-line arguments
//!
//! # Refund Lifecycle
//!
//! ```text
//! initiated → approved → instant_sent → posted → recouped
//!                             └───────────────────────┘ (collect)
//! ```
//!
//! - **approve**: Processor event creates or updates the refund
//! - **advance**: ACH credit to the consumer, ledger `advance` + `fee`
//! - **post**: The refund settled at the consumer's bank
//! - **collect**: ACH debit of the advance, ledger `repayment`
//! - **recoup**: Close the refund without a debit, ledger `adjustment`
//!
//! # Ledger Invariant
//!
//! A refund's ledger sums to its fee once it is recouped and to amount + fee
//! while the advance is outstanding.

pub mod cli;
pub mod config;
pub mod core;
pub mod ingest;
pub mod io;
pub mod strategy;
pub mod types;

pub use crate::config::AppConfig;
pub use crate::core::{InMemoryBackend, LifecycleConfig, RefundLifecycleEngine, RefundSummary};
pub use io::write_refunds_csv;
pub use types::{
    LedgerEntry, LedgerEntryType, Refund, RefundApproved, RefundError, RefundId, RefundStatus,
    TransactionPosted,
};
