//! Benchmark suite comparing script replay strategies
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Scripts are generated per run: every refund is approved, advanced, matched
//! by a correlated bank credit and collected, with one `reconcile` at the end.
//! The argument is the number of refunds.

use refund_advance_engine::cli::StrategyType;
use refund_advance_engine::strategy::{create_strategy, BatchConfig, EngineSettings};
use std::io::Write;
use tempfile::NamedTempFile;

fn main() {
    divan::main();
}

fn lifecycle_script(refunds: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "op,refund,amount,user").unwrap();
    writeln!(file, "link,,,demo-user").unwrap();
    for i in 0..refunds {
        let amount = 10 + (i % 500);
        writeln!(file, "approve,re_{i},{amount}.00,").unwrap();
        writeln!(file, "advance,re_{i},,").unwrap();
        writeln!(file, "bank_credit,re_{i},{amount}.00,").unwrap();
        writeln!(file, "collect,re_{i},,").unwrap();
    }
    writeln!(file, "reconcile,,,").unwrap();
    file.flush().unwrap();
    file
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn sync_strategy(bencher: divan::Bencher, refunds: usize) {
    let script = lifecycle_script(refunds);
    let strategy = create_strategy(StrategyType::Sync, None, EngineSettings::default());

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(script.path(), &mut output)
            .expect("Processing failed");
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn async_strategy(bencher: divan::Bencher, refunds: usize) {
    let script = lifecycle_script(refunds);
    let strategy = create_strategy(
        StrategyType::Async,
        Some(BatchConfig::default()),
        EngineSettings::default(),
    );

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(script.path(), &mut output)
            .expect("Processing failed");
    });
}
