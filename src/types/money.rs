//! Money conversions between integer cents and decimal dollars
//!
//! The engine stores every amount as whole cents. Dollars only appear at the
//! edges: bank webhooks report them, CSV scripts and reports use them.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert whole cents to a two-decimal dollar amount
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Convert a dollar amount to cents, rounding half away from zero
///
/// Returns `None` if the result does not fit in an `i64`.
pub fn dollars_to_cents(dollars: Decimal) -> Option<i64> {
    dollars
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
