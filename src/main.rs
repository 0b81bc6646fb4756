//! Refund Advance Engine CLI
//!
//! Replays a CSV script of refund lifecycle commands against an in-memory
//! engine and prints the resulting refunds as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > refunds.csv
//! cargo run -- --strategy sync script.csv > refunds.csv
//! cargo run -- --strategy async --batch-size 500 --max-concurrent 8 script.csv > refunds.csv
//! RUST_LOG=debug LOG_FORMAT=json cargo run -- script.csv
//! ```
//!
//! Logs go to stderr so stdout stays a clean CSV.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, script not found or unreadable, output failure)

use anyhow::anyhow;
use refund_advance_engine::cli;
use refund_advance_engine::config::{AppConfig, LogFormat};
use refund_advance_engine::strategy::{self, EngineSettings};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();
    let config = AppConfig::from_env()?;

    init_tracing(config.log_format);

    info!(
        strategy = ?args.strategy,
        program_funding_source = %config.program_funding_source,
        webhook_verification = config.webhook_verifier().is_some(),
        "starting refund advance engine"
    );

    let settings = EngineSettings {
        lifecycle: config.lifecycle_config(),
        default_user_id: args.demo_user.clone().unwrap_or(config.demo_user_id),
    };
    let batch_config = matches!(args.strategy, cli::StrategyType::Async).then(|| args.to_batch_config());
    let strategy = strategy::create_strategy(args.strategy, batch_config, settings);

    let mut output = std::io::stdout();
    strategy
        .process(&args.input_file, &mut output)
        .map_err(|e| anyhow!(e))?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
