//! Webhook ingestion tests
//!
//! Signed processor deliveries and bank-data deliveries applied to a live
//! engine, including redelivery and rejected signatures.

use chrono::Utc;
use refund_advance_engine::core::{InMemoryBackend, LifecycleConfig, RefundLifecycleEngine};
use refund_advance_engine::ingest::{
    BankWebhookHandler, ProcessorWebhookHandler, WebhookVerifier, DEFAULT_TOLERANCE_SECS,
};
use refund_advance_engine::types::{RefundError, RefundStatus};
use rstest::rstest;
use serde_json::json;

const SECRET: &str = "whsec_test";

fn setup() -> (InMemoryBackend, RefundLifecycleEngine, ProcessorWebhookHandler) {
    let backend = InMemoryBackend::new();
    let engine = backend.engine(LifecycleConfig::default());
    engine
        .link_destination("demo-user", "urn:funding-source:demo-user")
        .unwrap();
    let handler = ProcessorWebhookHandler::new(
        engine.clone(),
        WebhookVerifier::new(SECRET, DEFAULT_TOLERANCE_SECS),
        "demo-user",
    );
    (backend, engine, handler)
}

fn signed(body: &[u8]) -> String {
    WebhookVerifier::new(SECRET, DEFAULT_TOLERANCE_SECS)
        .sign(Utc::now().timestamp(), body)
        .unwrap()
}

fn charge_refunded(event_id: &str, refund_id: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": "charge.refunded",
        "data": {"object": {
            "id": "ch_1",
            "amount_refunded": amount,
            "refunds": {"data": [{"id": refund_id, "amount": amount}]},
            "payment_method_details": {"card": {"last4": "4242"}},
            "billing_details": {"name": "Acme Outfitters"}
        }}
    }))
    .unwrap()
}

fn bank_credit(transaction_id: &str, amount: f64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "webhook_type": "TRANSACTIONS",
        "webhook_code": "DEFAULT_UPDATE",
        "new_transactions": [
            {"transaction_id": transaction_id, "amount": amount, "transaction_code": null}
        ]
    }))
    .unwrap()
}

#[test]
fn test_signed_approval_creates_refund() {
    let (_, engine, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);

    let outcome = handler.handle(&signed(&body), &body).unwrap();

    assert!(outcome.handled);
    assert!(!outcome.duplicate);
    let refund = engine.refund_by_processor_id("re_1").unwrap();
    assert_eq!(outcome.refund_ids, vec![refund.id]);
    assert_eq!(refund.status, RefundStatus::Approved);
    assert_eq!(refund.amount_cents, 4200);
    assert_eq!(refund.card_last4.as_deref(), Some("4242"));
    assert_eq!(refund.merchant_id.as_deref(), Some("Acme Outfitters"));
    assert_eq!(refund.user_id, "demo-user");
}

#[test]
fn test_redelivered_event_is_answered_from_first_delivery() {
    let (backend, _, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);

    let first = handler.handle(&signed(&body), &body).unwrap();
    let second = handler.handle(&signed(&body), &body).unwrap();

    assert!(second.duplicate);
    assert_eq!(second.refund_ids, first.refund_ids);
    assert_eq!(backend.refunds.len(), 1);
}

#[test]
fn test_distinct_events_for_same_refund_update_one_row() {
    let (backend, _, handler) = setup();
    let first = charge_refunded("evt_1", "re_1", 4200);
    let second = charge_refunded("evt_2", "re_1", 4200);

    let a = handler.handle(&signed(&first), &first).unwrap();
    let b = handler.handle(&signed(&second), &second).unwrap();

    assert!(!b.duplicate);
    assert_eq!(a.refund_ids, b.refund_ids);
    assert_eq!(backend.refunds.len(), 1);
}

#[test]
fn test_bad_signature_applies_nothing() {
    let (backend, _, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);
    let forged = WebhookVerifier::new("whsec_other", DEFAULT_TOLERANCE_SECS)
        .sign(Utc::now().timestamp(), &body)
        .unwrap();

    let result = handler.handle(&forged, &body);

    assert!(matches!(result, Err(RefundError::SignatureInvalid { .. })));
    assert!(backend.refunds.is_empty());
    assert!(backend.idempotency.records().is_empty());
}

#[test]
fn test_unhandled_event_type_is_acknowledged() {
    let (backend, _, handler) = setup();
    let body = serde_json::to_vec(&json!({
        "id": "evt_9",
        "type": "payout.paid",
        "data": {"object": {"id": "po_1"}}
    }))
    .unwrap();

    let outcome = handler.handle(&signed(&body), &body).unwrap();

    assert!(!outcome.handled);
    assert!(outcome.refund_ids.is_empty());
    assert!(backend.refunds.is_empty());
}

#[test]
fn test_zero_amount_approval_can_be_redelivered() {
    let (backend, _, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 0);

    let first = handler.handle(&signed(&body), &body);
    let second = handler.handle(&signed(&body), &body);

    assert!(matches!(first, Err(RefundError::InvalidAmount { .. })));
    assert!(matches!(second, Err(RefundError::InvalidAmount { .. })));
    assert!(backend.refunds.is_empty());
}

#[test]
fn test_bank_credit_posts_advanced_refund_once() {
    let (_, engine, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);
    let refund_id = handler.handle(&signed(&body), &body).unwrap().refund_ids[0];
    engine.advance(refund_id).unwrap();
    let bank = BankWebhookHandler::new(engine.clone());

    let first = bank.handle(&bank_credit("txn_1", -42.0)).unwrap();
    let second = bank.handle(&bank_credit("txn_1", -42.0)).unwrap();

    assert!(first.handled);
    assert_eq!(first.posted, vec![refund_id]);
    assert_eq!(second.duplicates, 1);
    assert_eq!(second.posted, vec![refund_id]);
    assert_eq!(engine.refund(refund_id).unwrap().status, RefundStatus::Posted);

    engine.collect(refund_id).unwrap();
    assert_eq!(engine.summary(refund_id).unwrap().balance_cents, 226);
}

#[test]
fn test_bank_debits_and_other_webhooks_are_ignored() {
    let (_, engine, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);
    let refund_id = handler.handle(&signed(&body), &body).unwrap().refund_ids[0];
    engine.advance(refund_id).unwrap();
    let bank = BankWebhookHandler::new(engine.clone());

    let debit = bank.handle(&bank_credit("txn_1", 42.0)).unwrap();
    let other = bank
        .handle(br#"{"webhook_type":"ITEM","webhook_code":"ERROR"}"#)
        .unwrap();

    assert!(debit.handled);
    assert!(debit.posted.is_empty());
    assert!(!other.handled);
    assert_eq!(
        engine.refund(refund_id).unwrap().status,
        RefundStatus::InstantSent
    );
}

#[rstest]
#[case::decimal_overflow("-79228162514264337593543950335")]
#[case::i64_min("-92233720368547758.08")]
fn test_out_of_range_bank_credit_is_skipped(#[case] amount: &str) {
    let (backend, engine, _) = setup();
    let bank = BankWebhookHandler::new(engine);
    let body = serde_json::to_vec(&json!({
        "webhook_type": "TRANSACTIONS",
        "webhook_code": "DEFAULT_UPDATE",
        "new_transactions": [{"transaction_id": "txn_1", "amount": amount}]
    }))
    .unwrap();

    let outcome = bank.handle(&body).unwrap();

    assert!(outcome.handled);
    assert!(outcome.posted.is_empty());
    assert!(backend.idempotency.records().is_empty());
}

#[test]
fn test_forged_extreme_timestamp_is_rejected() {
    let (backend, _, handler) = setup();
    let body = charge_refunded("evt_1", "re_1", 4200);
    let header = format!("t={},v1={}", i64::MIN, "00".repeat(32));

    let result = handler.handle(&header, &body);

    assert!(matches!(result, Err(RefundError::SignatureInvalid { .. })));
    assert!(backend.refunds.is_empty());
}

#[test]
fn test_malformed_bank_webhook_is_rejected() {
    let (_, engine, _) = setup();
    let bank = BankWebhookHandler::new(engine);

    assert!(matches!(
        bank.handle(b"{}"),
        Err(RefundError::InvalidEvent { .. })
    ));
}
