//! Error types for the Refund Advance Engine
//!
//! This module defines every error a lifecycle operation can return, plus the
//! narrower errors of the store and gateway collaborators that convert into it.
//!
//! # Error Categories
//!
//! - **Validation Errors**: refund missing, wrong status, bad amount, no payout
//!   destination. Detected before any side effect; never retried.
//! - **Collaborator Errors**: gateway or store failures. Retry-safe, because
//!   every side-effecting operation runs under an idempotency key.
//! - **Ingestion Errors**: bad webhook signature or malformed payload.

use super::refund::{RefundId, RefundStatus};
use thiserror::Error;

/// Main error type for lifecycle operations
///
/// Every operation returns one of these variants, giving callers a stable
/// classification of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    /// A refund, consumer or other entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// The refund's current status does not allow the operation
    #[error("Cannot {operation} refund {refund} in status {status}")]
    InvalidTransition {
        /// Refund the operation was attempted on
        refund: RefundId,
        /// Status observed when the operation was validated
        status: RefundStatus,
        /// Operation that was rejected
        operation: String,
    },

    /// The refund amount is not a positive number of cents
    #[error("Invalid amount {amount_cents} for refund {reference}")]
    InvalidAmount {
        /// Refund id or external refund id
        reference: String,
        /// The rejected amount
        amount_cents: i64,
    },

    /// The consumer has no verified payout/funding destination
    #[error("No verified payout destination for user {user}")]
    MissingDestination {
        /// Consumer without a destination
        user: String,
    },

    /// The transfer gateway rejected or failed the instruction
    #[error("Transfer gateway failure: {message}")]
    GatewayFailure {
        /// Description of the gateway failure
        message: String,
    },

    /// An inbound event failed its authenticity check
    #[error("Invalid webhook signature: {reason}")]
    SignatureInvalid {
        /// Why verification failed
        reason: String,
    },

    /// A ledger, refund or idempotency write or read failed
    #[error("Store failure: {message}")]
    StoreFailure {
        /// Description of the store failure
        message: String,
    },

    /// Another caller holds the idempotency key and did not finish in time
    #[error("Operation {key} is still in progress")]
    InProgress {
        /// The contended idempotency key
        key: String,
    },

    /// An inbound payload could not be interpreted
    #[error("Invalid event: {message}")]
    InvalidEvent {
        /// Description of the problem
        message: String,
    },
}

impl RefundError {
    /// Whether the caller may safely retry the same request
    ///
    /// Gateway, store and in-progress errors are retry-safe; everything else is
    /// terminal for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RefundError::GatewayFailure { .. }
                | RefundError::StoreFailure { .. }
                | RefundError::InProgress { .. }
        )
    }

    /// Create a NotFound error for a refund
    pub fn refund_not_found(id: impl ToString) -> Self {
        RefundError::NotFound {
            entity: "Refund".to_string(),
            id: id.to_string(),
        }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(refund: RefundId, status: RefundStatus, operation: &str) -> Self {
        RefundError::InvalidTransition {
            refund,
            status,
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(reference: impl ToString, amount_cents: i64) -> Self {
        RefundError::InvalidAmount {
            reference: reference.to_string(),
            amount_cents,
        }
    }

    /// Create a MissingDestination error
    pub fn missing_destination(user: &str) -> Self {
        RefundError::MissingDestination {
            user: user.to_string(),
        }
    }

    /// Create a GatewayFailure error
    pub fn gateway_failure(message: impl ToString) -> Self {
        RefundError::GatewayFailure {
            message: message.to_string(),
        }
    }

    /// Create a SignatureInvalid error
    pub fn signature_invalid(reason: &str) -> Self {
        RefundError::SignatureInvalid {
            reason: reason.to_string(),
        }
    }

    /// Create a StoreFailure error
    pub fn store_failure(message: impl ToString) -> Self {
        RefundError::StoreFailure {
            message: message.to_string(),
        }
    }

    /// Create an InvalidEvent error
    pub fn invalid_event(message: impl ToString) -> Self {
        RefundError::InvalidEvent {
            message: message.to_string(),
        }
    }
}

/// Errors reported by persistence collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness-enforcing insert found an existing row
    #[error("Key {key} already exists")]
    Conflict {
        /// The duplicated key
        key: String,
    },

    /// The store could not serve the request
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the failure
        message: String,
    },
}

/// Errors reported by the transfer gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider answered with a non-success status
    #[error("provider rejected transfer ({status}): {message}")]
    Rejected {
        /// Provider status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// The provider could not be reached
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },
}

// Conversion from StoreError to RefundError
impl From<StoreError> for RefundError {
    fn from(error: StoreError) -> Self {
        RefundError::StoreFailure {
            message: error.to_string(),
        }
    }
}

// Conversion from GatewayError to RefundError
impl From<GatewayError> for RefundError {
    fn from(error: GatewayError) -> Self {
        RefundError::GatewayFailure {
            message: error.to_string(),
        }
    }
}
