//! Asynchronous batch processing strategy
//!
//! Reads the script in batches and applies each batch through a
//! [`BatchProcessor`], which runs different refunds concurrently on a tokio
//! multi-thread runtime.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (barrier segmentation + refund partitioning)
//!         └── CommandDispatcher → RefundLifecycleEngine (DashMap-backed stores)
//! ```
//!
//! # Ordering
//!
//! Batches are applied one after another, and within a batch each refund's
//! commands keep their file order. Commands that can touch any refund run as
//! barriers. The summary is therefore identical to the sync strategy's.

use crate::core::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_refunds_csv;
use crate::strategy::{EngineSettings, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Worker threads of the runtime, bounding how many refunds run at once
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    settings: EngineSettings,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, settings: EngineSettings) -> Self {
        Self { config, settings }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let dispatcher = Arc::new(self.settings.dispatcher());
            let processor = BatchProcessor::new(Arc::clone(&dispatcher));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files need the compat layer
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                debug!(commands = batch.len(), "processing batch");
                for result in processor.process_batch(batch).await {
                    if let Err(e) = result.result {
                        warn!(op = result.command.name(), error = %e, "command rejected");
                    }
                }
            }

            let summaries = dispatcher
                .summaries()
                .map_err(|e| format!("Failed to read refunds: {}", e))?;
            write_refunds_csv(&summaries, output)?;

            Ok(())
        })
    }
}
