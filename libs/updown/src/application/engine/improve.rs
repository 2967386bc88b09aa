//! Probabilistic maker improvement.
//!
//! Each market keeps a cached decision of how many ticks above the best bid
//! each leg should sit. The per-series distribution picks 0, 1, or 2 ticks;
//! the pair is then capped by the edge budget so improvement never spends
//! edge the entry threshold needs.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::domain::SeriesKey;

/// Improvement tick weights per series: (weight of 0, 1, 2 ticks).
fn series_weights(series: SeriesKey) -> [f64; 3] {
    match series {
        SeriesKey::Btc15m | SeriesKey::Eth15m => [0.55, 0.35, 0.10],
        SeriesKey::Btc1h | SeriesKey::Eth1h => [0.70, 0.25, 0.05],
        SeriesKey::Other => [0.85, 0.14, 0.01],
    }
}

pub fn sample_improvement<R: Rng>(rng: &mut R, series: SeriesKey) -> u32 {
    let weights = series_weights(series);
    let mut roll = rng.gen::<f64>() * weights.iter().sum::<f64>();
    for (ticks, w) in weights.iter().enumerate() {
        roll -= w;
        if roll <= 0.0 {
            return ticks as u32;
        }
    }
    0
}

/// Sample both legs, then enforce `up + down <= budget_ticks`.
pub fn improvement_pair<R: Rng>(
    rng: &mut R,
    series: SeriesKey,
    budget_ticks: i64,
) -> (u32, u32) {
    let up = sample_improvement(rng, series);
    let down = sample_improvement(rng, series);
    trim_pair(up, down, budget_ticks)
}

/// Enforce the total-budget constraint, trimming the larger improvement
/// first. Also applied to cached pairs when the edge budget has shrunk.
pub fn trim_pair(mut up: u32, mut down: u32, budget_ticks: i64) -> (u32, u32) {
    let budget = budget_ticks.max(0) as u32;
    while up + down > budget {
        if up >= down && up > 0 {
            up -= 1;
        } else if down > 0 {
            down -= 1;
        } else {
            break;
        }
    }
    (up, down)
}

/// Cached improvement decision for one market.
#[derive(Debug, Clone, Copy)]
pub struct ImproveChoice {
    pub up_ticks: u32,
    pub down_ticks: u32,
    pub spread_bucket: (i64, i64),
    pub sampled_at: DateTime<Utc>,
}

impl ImproveChoice {
    /// Cache TTL: the force-replace age, clamped to [3 s, 30 s].
    pub fn ttl(force_replace_millis: u64) -> Duration {
        Duration::milliseconds(force_replace_millis.clamp(3_000, 30_000) as i64)
    }

    pub fn is_valid(
        &self,
        now: DateTime<Utc>,
        spread_bucket: (i64, i64),
        force_replace_millis: u64,
    ) -> bool {
        self.spread_bucket == spread_bucket
            && now - self.sampled_at <= Self::ttl(force_replace_millis)
    }
}

/// Coarse spread class per leg; changing class invalidates the cache.
pub fn spread_bucket(spread_ticks_up: i64, spread_ticks_down: i64) -> (i64, i64) {
    (spread_ticks_up.min(4), spread_ticks_down.min(4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            assert!(sample_improvement(&mut rng, SeriesKey::Btc15m) <= 2);
        }
    }

    #[test]
    fn test_fifteen_minute_improves_more_often() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut count = |series| {
            (0..2000)
                .filter(|_| sample_improvement(&mut rng, series) > 0)
                .count()
        };
        let fast = count(SeriesKey::Btc15m);
        let other = count(SeriesKey::Other);
        assert!(fast > other, "15m {} should exceed other {}", fast, other);
    }

    #[test]
    fn test_budget_cap() {
        let mut rng = StdRng::seed_from_u64(5);
        for budget in 0..4 {
            for _ in 0..200 {
                let (up, down) = improvement_pair(&mut rng, SeriesKey::Btc15m, budget);
                assert!((up + down) as i64 <= budget);
            }
        }
    }

    #[test]
    fn test_trim_pair_trims_larger_first() {
        assert_eq!(trim_pair(2, 1, 2), (1, 1));
        assert_eq!(trim_pair(1, 2, 2), (1, 1));
        assert_eq!(trim_pair(2, 2, 1), (0, 1));
        assert_eq!(trim_pair(0, 0, 0), (0, 0));
    }

    #[test]
    fn test_negative_budget_means_no_improvement() {
        let mut rng = StdRng::seed_from_u64(5);
        let (up, down) = improvement_pair(&mut rng, SeriesKey::Btc15m, -2);
        assert_eq!((up, down), (0, 0));
    }

    #[test]
    fn test_cache_validity() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let choice = ImproveChoice {
            up_ticks: 1,
            down_ticks: 0,
            spread_bucket: (2, 2),
            sampled_at: now,
        };

        assert!(choice.is_valid(now + Duration::seconds(5), (2, 2), 10_000));
        // Bucket change invalidates
        assert!(!choice.is_valid(now + Duration::seconds(1), (1, 2), 10_000));
        // TTL clamp: force_replace 60s clamps to 30s
        assert!(!choice.is_valid(now + Duration::seconds(31), (2, 2), 60_000));
        // Clamp floor: force_replace 1s still allows 3s
        assert!(choice.is_valid(now + Duration::seconds(3), (2, 2), 1_000));
    }
}
