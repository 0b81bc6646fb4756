//! Processor (card network) webhook ingestion
//!
//! Turns signed processor deliveries into refund approvals. Two event types
//! approve a refund:
//!
//! - `charge.refunded`: the charge object; the latest entry of its refund list
//!   names the refund, falling back to the charge itself
//! - `refund.succeeded`: the refund object
//!
//! Any other type is acknowledged as unhandled. Every delivery is deduplicated
//! by the event's own id, so a redelivered event is answered from the first
//! delivery's result.

use crate::core::lifecycle::RefundLifecycleEngine;
use crate::ingest::signature::WebhookVerifier;
use crate::types::{OperationKey, RefundApproved, RefundError, RefundId, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Merchant reference used when the event names none
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    id: String,
    amount_refunded: Option<i64>,
    description: Option<String>,
    refunds: Option<List<RefundObject>>,
    payment_method_details: Option<PaymentMethodDetails>,
    billing_details: Option<BillingDetails>,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RefundObject {
    id: String,
    amount: Option<i64>,
    charge: Option<ChargeReference>,
}

/// A charge is either referenced by id or expanded inline
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChargeReference {
    Id(String),
    Expanded { id: String },
}

impl ChargeReference {
    fn into_id(self) -> String {
        match self {
            ChargeReference::Id(id) | ChargeReference::Expanded { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentMethodDetails {
    card: Option<CardDetails>,
}

#[derive(Debug, Deserialize)]
struct CardDetails {
    last4: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BillingDetails {
    name: Option<String>,
}

/// A verified, typed processor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    RefundApproved(RefundApproved),
    Unhandled { event_type: String },
}

/// Parse a processor delivery into its event id and typed event
///
/// `user_id` is the consumer the refund is attributed to; processor events do
/// not identify consumers.
pub fn parse_processor_event(body: &[u8], user_id: &str) -> Result<(String, ProcessorEvent), RefundError> {
    let envelope: EventEnvelope = serde_json::from_slice(body)
        .map_err(|e| RefundError::invalid_event(format!("malformed processor event: {}", e)))?;
    if envelope.id.trim().is_empty() {
        return Err(RefundError::invalid_event("processor event without an id"));
    }

    let event = match envelope.event_type.as_str() {
        "charge.refunded" => {
            let charge: ChargeObject = from_object(envelope.data.object)?;
            ProcessorEvent::RefundApproved(charge_refunded(charge, user_id))
        }
        "refund.succeeded" => {
            let refund: RefundObject = from_object(envelope.data.object)?;
            ProcessorEvent::RefundApproved(RefundApproved {
                external_refund_id: refund.id,
                charge_id: refund.charge.map(ChargeReference::into_id),
                amount_cents: refund.amount.unwrap_or(0),
                card_last4: None,
                merchant_ref: Some(UNKNOWN_MERCHANT.to_string()),
                user_id: user_id.to_string(),
            })
        }
        other => ProcessorEvent::Unhandled {
            event_type: other.to_string(),
        },
    };

    Ok((envelope.id, event))
}

fn from_object<T: for<'de> Deserialize<'de>>(object: serde_json::Value) -> Result<T, RefundError> {
    serde_json::from_value(object)
        .map_err(|e| RefundError::invalid_event(format!("malformed event object: {}", e)))
}

fn charge_refunded(charge: ChargeObject, user_id: &str) -> RefundApproved {
    let latest = charge.refunds.and_then(|refunds| refunds.data.into_iter().last());
    let (external_refund_id, amount) = match latest {
        Some(refund) => (refund.id, refund.amount),
        None => (charge.id.clone(), None),
    };

    let merchant = charge
        .billing_details
        .and_then(|details| details.name)
        .filter(|name| !name.is_empty())
        .or(charge.description.filter(|description| !description.is_empty()))
        .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());

    RefundApproved {
        external_refund_id,
        amount_cents: amount.or(charge.amount_refunded).unwrap_or(0),
        card_last4: charge
            .payment_method_details
            .and_then(|details| details.card)
            .and_then(|card| card.last4),
        merchant_ref: Some(merchant),
        charge_id: Some(charge.id),
        user_id: user_id.to_string(),
    }
}

/// Result of handling one processor delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    /// Whether the event type is one the engine acts on
    pub handled: bool,
    pub refund_ids: Vec<RefundId>,
    /// True when this delivery repeated an already processed event
    #[serde(default)]
    pub duplicate: bool,
}

/// Verifies, parses and applies processor webhooks
#[derive(Clone)]
pub struct ProcessorWebhookHandler {
    engine: RefundLifecycleEngine,
    verifier: WebhookVerifier,
    default_user_id: UserId,
}

impl ProcessorWebhookHandler {
    pub fn new(engine: RefundLifecycleEngine, verifier: WebhookVerifier, default_user_id: impl Into<UserId>) -> Self {
        Self {
            engine,
            verifier,
            default_user_id: default_user_id.into(),
        }
    }

    /// Handle one delivery
    ///
    /// # Errors
    ///
    /// * `RefundError::SignatureInvalid` - Authentication failed; nothing applied
    /// * `RefundError::InvalidEvent` - The body is not a processor event
    /// * Any engine error from applying the approval; the event may be redelivered
    pub fn handle(&self, signature_header: &str, body: &[u8]) -> Result<WebhookOutcome, RefundError> {
        self.verifier.verify(signature_header, body, Utc::now())?;
        let (event_id, event) = parse_processor_event(body, &self.default_user_id)?;

        let key = OperationKey::Event(event_id.clone()).to_string();
        let run = self.engine.guard().run_once(&key, || match event {
            ProcessorEvent::RefundApproved(approval) => {
                let refund = self.engine.approve(approval)?;
                Ok(WebhookOutcome {
                    event_id: event_id.clone(),
                    handled: true,
                    refund_ids: vec![refund.id],
                    duplicate: false,
                })
            }
            ProcessorEvent::Unhandled { event_type } => {
                info!(event_id = %event_id, event_type = %event_type, "unhandled processor event");
                Ok(WebhookOutcome {
                    event_id: event_id.clone(),
                    handled: false,
                    refund_ids: Vec::new(),
                    duplicate: false,
                })
            }
        })?;

        if run.already_ran {
            warn!(event_id = %event_id, "duplicate processor event delivery");
        }
        Ok(WebhookOutcome {
            duplicate: run.already_ran,
            ..run.result
        })
    }
}
