//! Processing strategies for command scripts
//!
//! A strategy owns the whole replay pipeline: reading the CSV script, applying
//! each command to a fresh in-memory engine and writing the refund summary.
//! Strategies are selected at runtime and must produce identical output for
//! the same script.

use crate::cli::StrategyType;
use crate::config::DEFAULT_DEMO_USER_ID;
use crate::core::dispatcher::CommandDispatcher;
use crate::core::lifecycle::{InMemoryBackend, LifecycleConfig};
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Engine settings shared by every strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub lifecycle: LifecycleConfig,

    /// Consumer credited by approvals that name no user
    pub default_user_id: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            default_user_id: DEFAULT_DEMO_USER_ID.to_string(),
        }
    }
}

impl EngineSettings {
    /// A dispatcher over a fresh in-memory engine
    pub fn dispatcher(&self) -> CommandDispatcher {
        let engine = InMemoryBackend::new().engine(self.lifecycle.clone());
        CommandDispatcher::new(engine, self.default_user_id.clone())
    }
}

/// Complete script replay pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the script at `input_path` and write the refund summary CSV
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be opened or the output cannot be
    /// written. Rows that fail to parse and commands the engine rejects are
    /// logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create the strategy selected on the command line
///
/// `config` only applies to the async strategy; the default is used when it
/// is `None`.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    settings: EngineSettings,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(settings)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            config.unwrap_or_default(),
            settings,
        )),
    }
}
