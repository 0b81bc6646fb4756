//! Synchronous processing strategy
//!
//! Streams the script through a [`SyncReader`] and applies each command in
//! file order on the calling thread. This is the reference behavior the async
//! strategy has to match.

use crate::io::csv_format::write_refunds_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{EngineSettings, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use refund_advance_engine::strategy::{EngineSettings, ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(EngineSettings::default());
/// let mut output = std::io::stdout();
///
/// strategy.process(Path::new("script.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    settings: EngineSettings,
}

impl SyncProcessingStrategy {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let dispatcher = self.settings.dispatcher();
        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(command) => {
                    let op = command.name();
                    if let Err(e) = dispatcher.apply(command) {
                        warn!(op, error = %e, "command rejected");
                    }
                }
                Err(e) => warn!(error = %e, "skipping invalid row"),
            }
        }

        let summaries = dispatcher
            .summaries()
            .map_err(|e| format!("Failed to read refunds: {}", e))?;
        write_refunds_csv(&summaries, output)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(content: &str) -> String {
        let file = create_temp_csv(content);
        let mut output = Vec::new();
        SyncProcessingStrategy::default()
            .process(file.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_sync_strategy_advances_refund() {
        let output = run("op,refund,amount,user\n\
            link,,,demo-user\n\
            approve,re_1,42.00,\n\
            advance,re_1,,\n");

        assert_eq!(
            output,
            "refund,status,amount,fee,balance\nre_1,instant_sent,42.00,2.26,44.26\n"
        );
    }

    #[test]
    fn test_sync_strategy_skips_rejected_commands() {
        // No destination linked, so the advance is rejected
        let output = run("op,refund,amount,user\n\
            approve,re_1,42.00,\n\
            advance,re_1,,\n\
            collect,re_missing,,\n");

        assert_eq!(
            output,
            "refund,status,amount,fee,balance\nre_1,approved,42.00,2.26,0.00\n"
        );
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let mut output = Vec::new();
        let result = SyncProcessingStrategy::default().process(Path::new("nonexistent.csv"), &mut output);

        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
