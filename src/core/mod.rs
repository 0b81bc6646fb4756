//! Core business logic module
//!
//! This module contains the refund lifecycle components:
//! - `traits` - Collaborator abstractions (stores, gateway, destinations)
//! - `refund_store`, `ledger_store`, `idempotency_store` - In-memory stores
//! - `idempotency` - Run-once guard for side-effecting operations
//! - `fee` - Advance fee calculation
//! - `gateway` - Simulated ACH transfer gateway
//! - `destinations` - Verified consumer payout destinations
//! - `lifecycle` - State machine and orchestration
//! - `reconcile` - Repair of transfers whose bookkeeping did not land
//! - `dispatcher` - Lifecycle commands onto engine operations
//! - `batch_processor` - Concurrent batch application partitioned by refund

pub mod batch_processor;
pub mod destinations;
pub mod dispatcher;
pub mod fee;
pub mod gateway;
pub mod idempotency;
pub mod idempotency_store;
pub mod ledger_store;
pub mod lifecycle;
pub mod reconcile;
pub mod refund_store;
pub mod traits;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use destinations::MemoryDestinationDirectory;
pub use dispatcher::CommandDispatcher;
pub use fee::{calc_fee_cents, FeeBreakdown};
pub use gateway::SimulatedGateway;
pub use idempotency::{GuardPolicy, IdempotencyGuard, RunOnce};
pub use idempotency_store::MemoryIdempotencyStore;
pub use ledger_store::MemoryLedgerStore;
pub use lifecycle::{
    Collaborators, InMemoryBackend, LifecycleConfig, RefundLifecycleEngine, RefundSummary,
    TransferOutcome,
};
pub use reconcile::ReconcileReport;
pub use refund_store::MemoryRefundStore;
