//! Tick arithmetic.
//!
//! Prices live in [0, 1] and every submitted price must be an exact multiple
//! of the token's tick. Rounding direction is the caller's choice: maker BUY
//! rounds down toward the bid, a hedge BUY lifting the ask rounds up.
//! Results are normalized to 6 decimals so equality survives f64 noise for
//! ticks down to 0.001.

/// Tolerance for float comparisons on prices.
pub const PRICE_EPSILON: f64 = 1e-9;

fn normalize(price: f64) -> f64 {
    (price * 1e6).round() / 1e6
}

/// Largest tick multiple <= price.
pub fn floor_to_tick(price: f64, tick: f64) -> f64 {
    let ticks = (price / tick + PRICE_EPSILON).floor();
    normalize(ticks * tick)
}

/// Smallest tick multiple >= price.
pub fn ceil_to_tick(price: f64, tick: f64) -> f64 {
    let ticks = (price / tick - PRICE_EPSILON).ceil();
    normalize(ticks * tick)
}

pub fn is_tick_multiple(price: f64, tick: f64) -> bool {
    let ticks = price / tick;
    (ticks - ticks.round()).abs() < 1e-6
}

/// Whole ticks from `lower` up to `upper`; negative when upper < lower.
pub fn ticks_between(lower: f64, upper: f64, tick: f64) -> i64 {
    ((upper - lower) / tick + PRICE_EPSILON * (if upper >= lower { 1.0 } else { -1.0 })).floor()
        as i64
}

/// Quantize a share size down to 2 decimals (the exchange's size precision).
pub fn quantize_size_down(size: f64) -> f64 {
    ((size + 1e-9) * 100.0).floor() / 100.0
}
