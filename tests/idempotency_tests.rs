//! Run-once guarantees under concurrency
//!
//! These tests hammer the idempotency guard and the guarded engine operations
//! from plain OS threads and check that each key executes exactly once while
//! every caller observes the same result.

use refund_advance_engine::core::idempotency::{GuardPolicy, IdempotencyGuard};
use refund_advance_engine::core::traits::IdempotencyStore;
use refund_advance_engine::core::{InMemoryBackend, LifecycleConfig, MemoryIdempotencyStore};
use refund_advance_engine::types::{IdempotencyStatus, RefundApproved, RefundError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn guard() -> (Arc<IdempotencyGuard>, Arc<MemoryIdempotencyStore>) {
    let store = Arc::new(MemoryIdempotencyStore::new());
    let guard = IdempotencyGuard::new(
        store.clone(),
        GuardPolicy {
            in_progress_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(2),
        },
    );
    (Arc::new(guard), store)
}

#[test]
fn test_concurrent_callers_share_one_execution() {
    let (guard, store) = guard();
    let executions = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let guard = Arc::clone(&guard);
            let executions = Arc::clone(&executions);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                guard.run_once("advance:shared", || {
                    executions.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    Ok(format!("transfer-from-thread-{}", i))
                })
            })
        })
        .collect();

    let runs: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(runs.iter().filter(|run| !run.already_ran).count(), 1);
    assert!(runs.iter().all(|run| run.result == runs[0].result));

    let record = store.get("advance:shared").unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Completed);
    assert_eq!(record.attempts, 1);
}

#[test]
fn test_distinct_keys_do_not_block_each_other() {
    let (guard, store) = guard();
    let executions = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let guard = Arc::clone(&guard);
            let executions = Arc::clone(&executions);
            thread::spawn(move || {
                guard.run_once(&format!("collect:{}", i), || {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let run = handle.join().unwrap().unwrap();
        assert_eq!(run.result, i);
        assert!(!run.already_ran);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 8);
    assert_eq!(store.records().len(), 8);
}

#[test]
fn test_failure_then_concurrent_retries_execute_once_more() {
    let (guard, store) = guard();
    let failed = guard.run_once::<u32, _>("k", || Err(RefundError::gateway_failure("timeout")));
    assert!(failed.is_err());

    let executions = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let executions = Arc::clone(&executions);
            thread::spawn(move || {
                guard.run_once("k", || {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(9u32)
                })
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().result, 9);
    }

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    let record = store.get("k").unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Completed);
    assert_eq!(record.attempts, 2);
}

#[test]
fn test_concurrent_collects_move_money_once() {
    let backend = InMemoryBackend::new();
    let engine = backend.engine(LifecycleConfig::default());
    engine
        .link_destination("user-1", "urn:funding-source:user-1")
        .unwrap();
    let refund = engine
        .approve(RefundApproved {
            external_refund_id: "re_1".to_string(),
            charge_id: None,
            amount_cents: 4200,
            card_last4: None,
            merchant_ref: None,
            user_id: "user-1".to_string(),
        })
        .unwrap();
    engine.advance(refund.id).unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.collect(refund.id)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.iter().any(Result::is_ok));
    assert!(results.iter().all(|result| matches!(
        result,
        Ok(_) | Err(RefundError::InvalidTransition { .. })
    )));
    assert_eq!(backend.gateway.call_count(), 2);
    assert_eq!(backend.gateway.transfer_count(), 2);
    assert_eq!(backend.ledger.entry_count(), 3);

    let summary = engine.summary(refund.id).unwrap();
    assert_eq!(summary.balance_cents, 226);
}
