//! Size skew heuristics.
//!
//! Quoted size is scaled by a price-level factor drawn per tick from a bucket
//! keyed on the leg's bid, and by a momentum factor that cuts the side the
//! trend runs against. A per-tick Bernoulli occasionally skips the lagging
//! leg entirely.

use rand::Rng;

use super::momentum::MomentumSignal;

/// Probability of quoting a leg whose size factor came out below 1.
pub const LAG_QUOTE_PROBABILITY: f64 = 0.95;

/// Price-level factor bucket for a bid level: (factor low, factor high).
fn price_level_bucket(bid: f64) -> (f64, f64) {
    if bid < 0.30 {
        (0.70, 0.80)
    } else if bid < 0.40 {
        (0.72, 0.82)
    } else if bid < 0.50 {
        (0.80, 0.90)
    } else if bid < 0.60 {
        (0.85, 0.95)
    } else {
        (1.00, 1.20)
    }
}

/// Uniform draw inside the bid's bucket.
pub fn price_level_factor<R: Rng>(rng: &mut R, bid: f64) -> f64 {
    let (lo, hi) = price_level_bucket(bid);
    rng.gen_range(lo..hi)
}

/// Momentum factors for (up, down). The leg the trend runs against gets cut
/// to [0.55, 0.65); neutral leaves both at 1.
pub fn momentum_factors<R: Rng>(rng: &mut R, signal: MomentumSignal) -> (f64, f64) {
    match signal {
        MomentumSignal::UpRising => (1.0, rng.gen_range(0.55..0.65)),
        MomentumSignal::UpFalling => (rng.gen_range(0.55..0.65), 1.0),
        MomentumSignal::Neutral => (1.0, 1.0),
    }
}

/// Whether to quote a leg given its final size factor. Factors below 1 mark
/// the lagging side; those legs are skipped with small probability.
pub fn should_quote_leg<R: Rng>(rng: &mut R, size_factor: f64) -> bool {
    if size_factor >= 1.0 {
        return true;
    }
    rng.gen_bool(LAG_QUOTE_PROBABILITY)
}
