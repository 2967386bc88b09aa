//! Short-window price-trend signal.
//!
//! A ring of (timestamp, mid) samples on the UP leg. The signal compares the
//! newest mid against the oldest sample still inside the window: moves past
//! the threshold call a trend, everything else is neutral.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::infrastructure::config::MomentumConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumSignal {
    UpRising,
    UpFalling,
    Neutral,
}

impl MomentumSignal {
    pub fn is_strong(&self) -> bool {
        !matches!(self, MomentumSignal::Neutral)
    }
}

impl std::fmt::Display for MomentumSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MomentumSignal::UpRising => write!(f, "UP_RISING"),
            MomentumSignal::UpFalling => write!(f, "UP_FALLING"),
            MomentumSignal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MomentumTracker {
    samples: VecDeque<(DateTime<Utc>, f64)>,
}

impl MomentumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, now: DateTime<Utc>, mid: f64, cfg: &MomentumConfig) {
        self.samples.push_back((now, mid));
        let cutoff = now - Duration::milliseconds(cfg.window_millis as i64);
        while let Some((ts, _)) = self.samples.front() {
            if *ts < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn signal(&self, cfg: &MomentumConfig) -> MomentumSignal {
        let (Some((_, oldest)), Some((_, newest))) =
            (self.samples.front(), self.samples.back())
        else {
            return MomentumSignal::Neutral;
        };

        let move_ = newest - oldest;
        if move_ >= cfg.min_move {
            MomentumSignal::UpRising
        } else if move_ <= -cfg.min_move {
            MomentumSignal::UpFalling
        } else {
            MomentumSignal::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cfg() -> MomentumConfig {
        MomentumConfig {
            window_millis: 30_000,
            min_move: 0.02,
        }
    }

    fn at(s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, s).unwrap()
    }

    #[test]
    fn test_neutral_until_enough_move() {
        let mut t = MomentumTracker::new();
        t.observe(at(0), 0.50, &cfg());
        t.observe(at(5), 0.51, &cfg());
        assert_eq!(t.signal(&cfg()), MomentumSignal::Neutral);

        t.observe(at(10), 0.52, &cfg());
        assert_eq!(t.signal(&cfg()), MomentumSignal::UpRising);
    }

    #[test]
    fn test_falling() {
        let mut t = MomentumTracker::new();
        t.observe(at(0), 0.50, &cfg());
        t.observe(at(10), 0.47, &cfg());
        assert_eq!(t.signal(&cfg()), MomentumSignal::UpFalling);
    }

    #[test]
    fn test_window_expires_old_samples() {
        let mut t = MomentumTracker::new();
        t.observe(at(0), 0.40, &cfg());
        // 40 seconds later the 0.40 sample is out of the 30s window
        t.observe(at(40), 0.50, &cfg());
        assert_eq!(t.signal(&cfg()), MomentumSignal::Neutral);
    }

    #[test]
    fn test_empty_is_neutral() {
        let t = MomentumTracker::new();
        assert_eq!(t.signal(&cfg()), MomentumSignal::Neutral);
    }
}
