//! Event ingestion
//!
//! Adapters from raw webhook deliveries to engine operations.
//!
//! - `signature` - HMAC verification of processor webhooks
//! - `processor` - Refund approvals from the card processor
//! - `bank` - Credits observed by the bank-data provider

pub mod bank;
pub mod processor;
pub mod signature;

pub use bank::{BankTransaction, BankWebhook, BankWebhookHandler, BankWebhookOutcome};
pub use processor::{
    parse_processor_event, ProcessorEvent, ProcessorWebhookHandler, WebhookOutcome,
    UNKNOWN_MERCHANT,
};
pub use signature::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};
