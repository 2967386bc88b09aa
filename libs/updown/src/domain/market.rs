//! Paired-market identity: series, legs, and the trading window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Market family. Conditions the probabilistic quoting heuristics
/// (maker improvement, taker probability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesKey {
    Btc15m,
    Eth15m,
    Btc1h,
    Eth1h,
    Other,
}

impl SeriesKey {
    /// Slot duration of the series. `Other` is treated as hourly.
    pub fn duration(&self) -> Duration {
        match self {
            SeriesKey::Btc15m | SeriesKey::Eth15m => Duration::minutes(15),
            SeriesKey::Btc1h | SeriesKey::Eth1h | SeriesKey::Other => Duration::hours(1),
        }
    }

    /// Pre-warm window before a slot starts during which the market is
    /// already considered active by discovery.
    pub fn prewarm(&self) -> Duration {
        if self.is_fifteen_minute() {
            Duration::seconds(90)
        } else {
            Duration::minutes(3)
        }
    }

    pub fn is_fifteen_minute(&self) -> bool {
        matches!(self, SeriesKey::Btc15m | SeriesKey::Eth15m)
    }

    pub fn from_asset_and_duration(asset: &str, fifteen_minute: bool) -> Self {
        match (asset.to_ascii_lowercase().as_str(), fifteen_minute) {
            ("btc", true) => SeriesKey::Btc15m,
            ("eth", true) => SeriesKey::Eth15m,
            ("btc", false) => SeriesKey::Btc1h,
            ("eth", false) => SeriesKey::Eth1h,
            _ => SeriesKey::Other,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesKey::Btc15m => write!(f, "btc-15m"),
            SeriesKey::Eth15m => write!(f, "eth-15m"),
            SeriesKey::Btc1h => write!(f, "btc-1h"),
            SeriesKey::Eth1h => write!(f, "eth-1h"),
            SeriesKey::Other => write!(f, "other"),
        }
    }
}

/// One leg of a paired market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Up,
    Down,
}

impl Leg {
    /// Total function - every leg has exactly one opposite.
    pub fn opposite(&self) -> Leg {
        match self {
            Leg::Up => Leg::Down,
            Leg::Down => Leg::Up,
        }
    }

    /// Index for small per-leg arrays.
    pub fn index(&self) -> usize {
        match self {
            Leg::Up => 0,
            Leg::Down => 1,
        }
    }

    pub const BOTH: [Leg; 2] = [Leg::Up, Leg::Down];
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Up => write!(f, "UP"),
            Leg::Down => write!(f, "DOWN"),
        }
    }
}

/// A paired Up/Down market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub slug: String,
    pub up_token: String,
    pub down_token: String,
    pub end_time: DateTime<Utc>,
    pub series: SeriesKey,
}

impl Market {
    pub fn token(&self, leg: Leg) -> &str {
        match leg {
            Leg::Up => &self.up_token,
            Leg::Down => &self.down_token,
        }
    }

    /// Which leg a token belongs to, if it belongs to this market at all.
    pub fn leg_of(&self, token: &str) -> Option<Leg> {
        if token == self.up_token {
            Some(Leg::Up)
        } else if token == self.down_token {
            Some(Leg::Down)
        } else {
            None
        }
    }

    /// Whole seconds until the end time. Negative once expired.
    pub fn seconds_to_end(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds()
    }

    /// Strictly past the end time. `seconds_to_end == 0` is still tradable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    /// Inside the configured trading window, bounds inclusive.
    pub fn in_trading_window(&self, now: DateTime<Utc>, min_secs: u64, max_secs: u64) -> bool {
        if self.is_expired(now) {
            return false;
        }
        let secs = self.seconds_to_end(now);
        secs >= min_secs as i64 && secs <= max_secs as i64
    }

    /// Compact identifier for log lines.
    pub fn short_desc(&self) -> &str {
        &self.slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn market_ending_at(end_time: DateTime<Utc>) -> Market {
        Market {
            slug: "btc-updown-15m-test".to_string(),
            up_token: "up_token".to_string(),
            down_token: "down_token".to_string(),
            end_time,
            series: SeriesKey::Btc15m,
        }
    }

    #[test]
    fn test_opposite_is_total_and_involutive() {
        for leg in Leg::BOTH {
            assert_ne!(leg, leg.opposite());
            assert_eq!(leg, leg.opposite().opposite());
        }
    }

    #[test]
    fn test_leg_of_token() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let m = market_ending_at(now);
        assert_eq!(m.leg_of("up_token"), Some(Leg::Up));
        assert_eq!(m.leg_of("down_token"), Some(Leg::Down));
        assert_eq!(m.leg_of("stranger"), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let m = market_ending_at(end);

        // Exactly at end_time is still tradable
        assert!(!m.is_expired(end));
        assert!(m.is_expired(end + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_trading_window_bounds_inclusive() {
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let m = market_ending_at(end);

        // seconds_to_end == min and == max are allowed, one past each is not
        assert!(m.in_trading_window(end - Duration::seconds(10), 10, 900));
        assert!(!m.in_trading_window(end - Duration::seconds(9), 10, 900));
        assert!(m.in_trading_window(end - Duration::seconds(900), 10, 900));
        assert!(!m.in_trading_window(end - Duration::seconds(901), 10, 900));
    }

    #[test]
    fn test_series_durations() {
        assert_eq!(SeriesKey::Btc15m.duration(), Duration::minutes(15));
        assert_eq!(SeriesKey::Eth1h.duration(), Duration::hours(1));
        assert_eq!(SeriesKey::Btc15m.prewarm(), Duration::seconds(90));
        assert_eq!(SeriesKey::Btc1h.prewarm(), Duration::minutes(3));
    }
}
