//! Discount evaluation, frozen into the order at placement.
//!
//! Later discount changes never retroactively affect placed orders: the
//! effective amount is computed once and written into the placement event.

use serde::{Deserialize, Serialize};

/// Basis points in a whole (100%).
const FULL_RATE_BPS: u32 = 10_000;

/// A discount applicable at placement time, supplied by the promotions
/// collaborator. Rates are basis points (10% = 1000).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub percent_bps: u32,
    pub stackable: bool,
}

impl Discount {
    pub fn single(percent_bps: u32) -> Self {
        Self {
            percent_bps,
            stackable: false,
        }
    }
}

/// Effective rate for a set of candidate discounts.
///
/// Policy: the best single non-stackable discount competes against the sum
/// of all explicitly-stackable discounts; the larger wins. Capped at 100%.
pub fn effective_rate_bps(discounts: &[Discount]) -> u32 {
    let best_single = discounts
        .iter()
        .filter(|d| !d.stackable)
        .map(|d| d.percent_bps)
        .max()
        .unwrap_or(0);

    let stacked: u32 = discounts
        .iter()
        .filter(|d| d.stackable)
        .map(|d| d.percent_bps)
        .sum();

    best_single.max(stacked).min(FULL_RATE_BPS)
}

/// Discount amount for a subtotal, rounded half-up to whole cents.
pub fn discount_amount_cents(subtotal_cents: u64, rate_bps: u32) -> u64 {
    // Half-up: add half the divisor before the integer division.
    (subtotal_cents * u64::from(rate_bps) + u64::from(FULL_RATE_BPS) / 2)
        / u64::from(FULL_RATE_BPS)
}
