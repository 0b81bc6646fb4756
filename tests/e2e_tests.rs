//! End-to-end integration tests
//!
//! Each test replays `tests/fixtures/<case>/input.csv` through a processing
//! strategy and compares the refund summary with `expected.csv`.
//!
//! Fixtures cover:
//! - The full lifecycle through collect and through recoup
//! - Repeated advances and approvals
//! - Rejected transitions and missing payout destinations
//! - Bank credits matched by amount and by explicit refund
//! - Malformed rows
//!
//! Every fixture runs under both strategies.

#[cfg(test)]
mod tests {
    use refund_advance_engine::cli::StrategyType;
    use refund_advance_engine::strategy::{create_strategy, BatchConfig, EngineSettings};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, config: Option<BatchConfig>) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let strategy = create_strategy(strategy_type, config, EngineSettings::default());
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process script: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("double_advance")]
    #[case("invalid_transitions")]
    #[case("missing_destination")]
    #[case("malformed_data")]
    #[case("amount_matching")]
    #[case("correlated_bank_credit")]
    #[case("duplicate_approvals")]
    #[case("collect_before_posting")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, None);
    }

    /// Batches smaller than the scripts force refunds to span several batches
    #[rstest]
    #[case("happy_path")]
    #[case("amount_matching")]
    #[case("collect_before_posting")]
    fn test_fixtures_with_tiny_batches(#[case] fixture: &str) {
        run_test_fixture(fixture, StrategyType::Async, Some(BatchConfig::new(2, 2)));
    }
}
