//! Decimal helpers shared by the fee and cost formulas.

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};

/// Scale used for intermediate quotients before the final currency rounding.
pub const INTERMEDIATE_SCALE: u32 = 10;

/// Currency amounts are stored with two decimal places.
pub const CURRENCY_SCALE: u32 = 2;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Round half-up (away from zero) to two decimal places.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Hours worked are recorded to the hundredth of an hour, half-up.
pub fn round_hours(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn round_intermediate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(INTERMEDIATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Elapsed time between two instants in fractional hours. Negative spans clamp to zero.
pub fn elapsed_hours(start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    round_intermediate(Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR))
}
