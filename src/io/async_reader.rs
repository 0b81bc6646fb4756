//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading of lifecycle commands from a CSV script for the
//! async processing strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LifecycleCommands
//!                  ↓
//!           csv_format module
//!           (CommandRecord, convert_command_record)
//! ```

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::types::LifecycleCommand;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` commands
    ///
    /// Rows that fail to parse or convert are logged and skipped. Returns an
    /// empty vector at end of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LifecycleCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CommandRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert_command_record(record) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(error = %e, "skipping invalid command"),
                },
                Some(Err(e)) => warn!(error = %e, "skipping unparsable row"),
                None => break,
            }
        }

        batch
    }
}
