//! Display rounding.
//!
//! Rounding is cosmetic: sums are taken over unrounded values and rounded
//! once on output.

/// Decimal places for a single calculated quantity
pub const QUANTITY_DECIMALS: u32 = 3;

/// Decimal places for aggregated totals
pub const TOTAL_DECIMALS: u32 = 2;

/// Decimal places for percentages
pub const PERCENT_DECIMALS: u32 = 1;

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    // -0.0 shows up when a tiny negative rounds away
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
