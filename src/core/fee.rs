//! Advance fee calculation
//!
//! The platform charges a flat $1.00 plus 3% of the refund amount for fronting
//! an advance, capped at $10.00. The fee is booked as its own ledger posting;
//! the consumer receives the full refund amount and repays the full amount.

use serde::{Deserialize, Serialize};

/// Flat part of the fee
pub const FEE_BASE_CENTS: i64 = 100;

/// Proportional part of the fee, in percent of the refund amount
pub const FEE_RATE_PERCENT: i64 = 3;

/// Upper bound of the fee
pub const FEE_CAP_CENTS: i64 = 1000;

/// `min(100 + floor(amount * 0.03), 1000)` in exact integer arithmetic
pub fn calc_fee_cents(amount_cents: i64) -> i64 {
    let proportional = amount_cents
        .saturating_mul(FEE_RATE_PERCENT)
        .div_euclid(100);
    FEE_BASE_CENTS
        .saturating_add(proportional)
        .min(FEE_CAP_CENTS)
}

/// How a refund amount splits into payout, fee and collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub amount_cents: i64,
    pub fee_cents: i64,
    /// Credited to the consumer at advance time
    pub payout_cents: i64,
    /// Debited from the consumer at collection time
    pub collect_cents: i64,
}

impl FeeBreakdown {
    pub fn for_amount(amount_cents: i64) -> Self {
        Self {
            amount_cents,
            fee_cents: calc_fee_cents(amount_cents),
            payout_cents: amount_cents,
            collect_cents: amount_cents,
        }
    }
}
