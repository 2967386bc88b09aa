//! Hedge-delay sampling.
//!
//! After one leg fills, the opposite leg is sometimes held back for a drawn
//! delay rather than hedged immediately. The draw picks a bucket by weight,
//! then a uniform point inside it. Buckets are clipped to the configured
//! [min, max] range; buckets emptied by the clip drop out of the draw.

use chrono::Duration;
use rand::Rng;

/// (lower seconds, upper seconds, weight)
const DELAY_BUCKETS: [(f64, f64, f64); 6] = [
    (2.0, 5.0, 0.05),
    (5.0, 10.0, 0.05),
    (10.0, 30.0, 0.10),
    (30.0, 60.0, 0.04),
    (60.0, 120.0, 0.30),
    (120.0, 300.0, 0.46),
];

pub fn sample_hedge_delay<R: Rng>(rng: &mut R, min_seconds: u64, max_seconds: u64) -> Duration {
    let lo = min_seconds as f64;
    let hi = (max_seconds as f64).max(lo);

    let clipped: Vec<(f64, f64, f64)> = DELAY_BUCKETS
        .iter()
        .filter_map(|&(b_lo, b_hi, w)| {
            let c_lo = b_lo.max(lo);
            let c_hi = b_hi.min(hi);
            if c_lo < c_hi {
                Some((c_lo, c_hi, w))
            } else {
                None
            }
        })
        .collect();

    if clipped.is_empty() {
        return Duration::milliseconds((lo * 1000.0) as i64);
    }

    let total_weight: f64 = clipped.iter().map(|(_, _, w)| w).sum();
    let mut roll = rng.gen::<f64>() * total_weight;
    for (c_lo, c_hi, w) in &clipped {
        roll -= w;
        if roll <= 0.0 {
            let secs = rng.gen_range(*c_lo..*c_hi);
            return Duration::milliseconds((secs * 1000.0) as i64);
        }
    }

    let (c_lo, c_hi, _) = clipped[clipped.len() - 1];
    let secs = rng.gen_range(c_lo..c_hi);
    Duration::milliseconds((secs * 1000.0) as i64)
}
