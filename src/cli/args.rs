use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay refund lifecycle commands and report the resulting refunds
#[derive(Parser, Debug)]
#[command(name = "refund-advance-engine")]
#[command(about = "Replay refund lifecycle commands and report refund state", long_about = None)]
pub struct CliArgs {
    /// Input CSV script of lifecycle commands
    #[arg(value_name = "INPUT", help = "Path to the command script (op,refund,amount,user)")]
    pub input_file: PathBuf,

    /// Processing strategy used to replay the script
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' applies commands in order, 'async' runs refunds in parallel"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads for the async runtime (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of refunds processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Consumer that approvals without a user are attributed to
    #[arg(
        long = "demo-user",
        value_name = "USER",
        help = "Default consumer for approvals (overrides DEMO_USER_ID)"
    )]
    pub demo_user: Option<String>,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Build the async batch settings from the flags, filling in defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_none() && self.max_concurrent_batches.is_none() {
            return BatchConfig::default();
        }

        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }
}
