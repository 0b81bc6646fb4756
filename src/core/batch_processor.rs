//! Batch processing with refund-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! lifecycle commands concurrently while preserving the order in which each
//! refund sees its own commands.
//!
//! # Design
//!
//! Most commands touch a single refund and can run in parallel with commands
//! for other refunds. A few (account links, reconciliation, bank credits that
//! are matched by amount) can touch any refund; these act as barriers. A batch
//! is cut into segments at every barrier:
//!
//! ```text
//! [a1 b1 a2] [link] [b2 c1] [reconcile] [a3]
//!  keyed      barrier keyed   barrier    keyed
//! ```
//!
//! Keyed segments are partitioned by refund and each partition runs on tokio's
//! blocking pool, since the engine is synchronous and may sleep while waiting
//! on a held idempotency key. A barrier runs alone once everything before it
//! has finished. The final state therefore matches a sequential replay of the
//! batch.
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be shared across tasks. The dispatcher
//! and its engine are shared through `Arc`; the stores underneath use `DashMap`.

use std::collections::HashMap;
use std::sync::Arc;

use super::dispatcher::CommandDispatcher;
use crate::types::{LifecycleCommand, RefundError};
use tracing::error;

/// Result of applying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was applied
    pub command: LifecycleCommand,

    /// The result of applying it
    pub result: Result<(), RefundError>,
}

/// Run of a batch between barriers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Refund-scoped commands, safe to partition by refund
    Keyed(Vec<LifecycleCommand>),

    /// A command that must run alone
    Barrier(LifecycleCommand),
}

/// Cut a batch into keyed runs and barriers, preserving order
pub fn segment(batch: Vec<LifecycleCommand>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut keyed = Vec::new();

    for command in batch {
        if command.refund_key().is_some() {
            keyed.push(command);
            continue;
        }
        if !keyed.is_empty() {
            segments.push(Segment::Keyed(std::mem::take(&mut keyed)));
        }
        segments.push(Segment::Barrier(command));
    }
    if !keyed.is_empty() {
        segments.push(Segment::Keyed(keyed));
    }

    segments
}

/// Batch processor with refund-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    dispatcher: Arc<CommandDispatcher>,
}

impl BatchProcessor {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Partition refund-scoped commands by external refund id
    ///
    /// Each partition keeps its commands in their original order. Commands
    /// without a refund key must not be passed here; they are grouped under
    /// the empty key if they are.
    pub fn partition_by_refund(
        &self,
        commands: Vec<LifecycleCommand>,
    ) -> HashMap<String, Vec<LifecycleCommand>> {
        let mut refund_batches: HashMap<String, Vec<LifecycleCommand>> = HashMap::new();

        for command in commands {
            let key = command.refund_key().unwrap_or_default().to_string();
            refund_batches.entry(key).or_default().push(command);
        }

        refund_batches
    }

    /// Apply one refund's commands sequentially
    pub fn process_refund_commands(
        &self,
        commands: Vec<LifecycleCommand>,
    ) -> Vec<ProcessingResult> {
        commands
            .into_iter()
            .map(|command| self.apply(command))
            .collect()
    }

    /// Apply a batch, running independent refunds concurrently
    ///
    /// Results of a keyed segment may come back in a different order than the
    /// input; all commands are applied even if some fail.
    pub async fn process_batch(&self, batch: Vec<LifecycleCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::new();

        for segment in segment(batch) {
            match segment {
                Segment::Barrier(command) => {
                    let processor = self.clone();
                    match tokio::task::spawn_blocking(move || processor.apply(command)).await {
                        Ok(result) => results.push(result),
                        Err(e) => error!(error = ?e, "barrier task panicked"),
                    }
                }
                Segment::Keyed(commands) => {
                    let mut tasks = Vec::new();
                    for (_refund, commands) in self.partition_by_refund(commands) {
                        let processor = self.clone();
                        tasks.push(tokio::task::spawn_blocking(move || {
                            processor.process_refund_commands(commands)
                        }));
                    }

                    for task in tasks {
                        match task.await {
                            Ok(refund_results) => results.extend(refund_results),
                            Err(e) => error!(error = ?e, "refund task panicked"),
                        }
                    }
                }
            }
        }

        results
    }

    fn apply(&self, command: LifecycleCommand) -> ProcessingResult {
        let result = self.dispatcher.apply(command.clone());
        ProcessingResult { command, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::idempotency::GuardPolicy;
    use crate::core::lifecycle::{InMemoryBackend, LifecycleConfig};
    use crate::core::traits::IdempotencyStore;
    use crate::types::{OperationKey, RefundStatus};
    use std::time::Duration;

    fn processor() -> BatchProcessor {
        let engine = InMemoryBackend::new().engine(LifecycleConfig::default());
        BatchProcessor::new(Arc::new(CommandDispatcher::new(engine, "demo-user")))
    }

    fn approve(id: &str, amount_cents: i64) -> LifecycleCommand {
        LifecycleCommand::Approve {
            external_refund_id: id.to_string(),
            amount_cents,
            user: None,
        }
    }

    fn advance(id: &str) -> LifecycleCommand {
        LifecycleCommand::Advance {
            external_refund_id: id.to_string(),
        }
    }

    #[test]
    fn test_segment_splits_at_barriers() {
        let link = LifecycleCommand::LinkAccount {
            user: "demo-user".to_string(),
        };
        let batch = vec![
            approve("re_1", 100),
            approve("re_2", 200),
            link.clone(),
            advance("re_1"),
            LifecycleCommand::Reconcile,
        ];

        let segments = segment(batch);

        assert_eq!(
            segments,
            vec![
                Segment::Keyed(vec![approve("re_1", 100), approve("re_2", 200)]),
                Segment::Barrier(link),
                Segment::Keyed(vec![advance("re_1")]),
                Segment::Barrier(LifecycleCommand::Reconcile),
            ]
        );
    }

    #[test]
    fn test_segment_of_empty_batch() {
        assert!(segment(Vec::new()).is_empty());
    }

    #[test]
    fn test_partition_keeps_per_refund_order() {
        let processor = processor();
        let partitions = processor.partition_by_refund(vec![
            approve("re_1", 100),
            approve("re_2", 200),
            advance("re_1"),
        ]);

        assert_eq!(partitions.len(), 2);
        assert_eq!(
            partitions["re_1"],
            vec![approve("re_1", 100), advance("re_1")]
        );
        assert_eq!(partitions["re_2"], vec![approve("re_2", 200)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_applies_every_command() {
        let processor = processor();
        let mut batch = vec![LifecycleCommand::LinkAccount {
            user: "demo-user".to_string(),
        }];
        for i in 0..20 {
            batch.push(approve(&format!("re_{}", i), 1000 + i));
            batch.push(advance(&format!("re_{}", i)));
        }

        let results = processor.process_batch(batch).await;

        assert_eq!(results.len(), 41);
        assert!(results.iter().all(|result| result.result.is_ok()));
        for summary in processor.dispatcher.summaries().unwrap() {
            assert_eq!(summary.refund.status, RefundStatus::InstantSent);
        }
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_fatal() {
        let processor = processor();
        let results = processor
            .process_batch(vec![approve("re_1", 100), advance("re_1")])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert!(matches!(
            results[1].result,
            Err(RefundError::MissingDestination { .. })
        ));
    }

    #[tokio::test]
    async fn test_waiting_on_held_key_does_not_stall_the_runtime() {
        let backend = InMemoryBackend::new();
        let engine = backend.engine(LifecycleConfig {
            guard_policy: GuardPolicy {
                in_progress_wait: Duration::from_millis(500),
                poll_interval: Duration::from_millis(5),
            },
            ..LifecycleConfig::default()
        });
        let dispatcher = CommandDispatcher::new(engine.clone(), "demo-user");
        dispatcher
            .apply(LifecycleCommand::LinkAccount {
                user: "demo-user".to_string(),
            })
            .unwrap();
        dispatcher.apply(approve("re_1", 4200)).unwrap();
        let refund = engine.refund_by_processor_id("re_1").unwrap();
        let key = OperationKey::Advance(refund.id).to_string();
        backend.idempotency.insert_in_progress(&key).unwrap();

        let processor = BatchProcessor::new(Arc::new(dispatcher));
        let batch = tokio::spawn(async move { processor.process_batch(vec![advance("re_1")]).await });

        // Single-threaded runtime: the holder only gets to finish if the
        // waiting partition is off the runtime thread
        tokio::task::yield_now().await;
        backend
            .idempotency
            .complete(&key, serde_json::json!({"transfer_id": "urn:transfer:held"}))
            .unwrap();

        let results = batch.await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].result.is_ok());
        assert_eq!(backend.gateway.call_count(), 0);
    }
}
