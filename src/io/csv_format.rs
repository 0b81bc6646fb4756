//! CSV format handling for command scripts and refund output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandRecord structure for deserialization
//! - Conversion from CSV records to lifecycle commands
//! - Refund summary output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Script Format
//!
//! ```text
//! op,refund,amount,user
//! link,,,alice
//! approve,re_1,42.00,alice
//! advance,re_1,,
//! bank_credit,,42.00,
//! collect,re_1,,
//! reconcile,,,
//! ```
//!
//! Amounts are dollars. `bank_credit` takes an optional refund to correlate
//! the credit with; without one the credit is matched by amount.

use crate::core::lifecycle::RefundSummary;
use crate::types::money::{cents_to_dollars, dollars_to_cents};
use crate::types::LifecycleCommand;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the script columns: op, refund, amount, user. Every column but
/// `op` is optional since most operations only use some of them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommandRecord {
    pub op: String,
    pub refund: Option<String>,
    pub amount: Option<String>,
    pub user: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Convert a CommandRecord to a LifecycleCommand
///
/// Validates that each operation has the columns it needs and converts dollar
/// amounts to cents.
///
/// # Returns
///
/// * `Ok(LifecycleCommand)` - Successfully converted record
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_command_record(record: CommandRecord) -> Result<LifecycleCommand, String> {
    let op = record.op.trim().to_lowercase();
    let refund = non_empty(record.refund);
    let user = non_empty(record.user);

    let amount_cents = match non_empty(record.amount) {
        Some(amount) => {
            let dollars = Decimal::from_str(&amount)
                .map_err(|_| format!("Invalid amount '{}' for {}", amount, op))?;
            let cents = dollars_to_cents(dollars)
                .ok_or_else(|| format!("Amount '{}' for {} is out of range", amount, op))?;
            Some(cents)
        }
        None => None,
    };

    let require_refund = |refund: Option<String>| {
        refund.ok_or_else(|| format!("{} requires a refund", op))
    };
    let require_amount = |amount: Option<i64>| {
        amount.ok_or_else(|| format!("{} requires an amount", op))
    };

    let command = match op.as_str() {
        "link" => LifecycleCommand::LinkAccount {
            user: user.ok_or_else(|| "link requires a user".to_string())?,
        },
        "approve" => LifecycleCommand::Approve {
            external_refund_id: require_refund(refund)?,
            amount_cents: require_amount(amount_cents)?,
            user,
        },
        "advance" => LifecycleCommand::Advance {
            external_refund_id: require_refund(refund)?,
        },
        "post" => LifecycleCommand::MarkPosted {
            external_refund_id: require_refund(refund)?,
        },
        "bank_credit" => LifecycleCommand::BankCredit {
            amount_cents: require_amount(amount_cents)?,
            external_refund_id: refund,
        },
        "collect" => LifecycleCommand::Collect {
            external_refund_id: require_refund(refund)?,
        },
        "recoup" => LifecycleCommand::MarkRecouped {
            external_refund_id: require_refund(refund)?,
        },
        "reconcile" => LifecycleCommand::Reconcile,
        _ => return Err(format!("Invalid operation: '{}'", record.op)),
    };

    Ok(command)
}

/// Write refund summaries to CSV format
///
/// Writes one row per refund with columns: refund, status, amount, fee,
/// balance. Amounts are dollars with two decimals; rows are sorted by
/// processor refund id for deterministic output.
pub fn write_refunds_csv(summaries: &[RefundSummary], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["refund", "status", "amount", "fee", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&RefundSummary> = summaries.iter().collect();
    sorted.sort_by(|a, b| {
        a.refund
            .processor_refund_id
            .cmp(&b.refund.processor_refund_id)
    });

    for summary in sorted {
        writer
            .write_record(&[
                summary.refund.processor_refund_id.clone(),
                summary.refund.status.to_string(),
                format!("{:.2}", cents_to_dollars(summary.refund.amount_cents)),
                format!("{:.2}", cents_to_dollars(summary.fee.fee_cents)),
                format!("{:.2}", cents_to_dollars(summary.balance_cents)),
            ])
            .map_err(|e| format!("Failed to write refund record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
