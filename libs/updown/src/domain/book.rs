//! Top-of-book snapshot per token.
//!
//! The engine only consumes L1: best bid/ask with resting sizes, a freshness
//! timestamp, and the last trade when the transport reports one. Freshness is
//! the caller's responsibility via `age_millis`.

use chrono::{DateTime, Utc};

/// One side's best level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Last trade observed on a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastTrade {
    pub price: f64,
    pub at: DateTime<Utc>,
}

/// Latest observation for a single token. Either side may be missing when the
/// book is one-sided.
#[derive(Debug, Clone, PartialEq)]
pub struct TopOfBook {
    pub bid: Option<BookLevel>,
    pub ask: Option<BookLevel>,
    pub updated_at: DateTime<Utc>,
    pub last_trade: Option<LastTrade>,
}

impl TopOfBook {
    pub fn bid_price(&self) -> Option<f64> {
        self.bid.map(|l| l.price)
    }

    pub fn ask_price(&self) -> Option<f64> {
        self.ask.map(|l| l.price)
    }

    pub fn bid_size(&self) -> f64 {
        self.bid.map(|l| l.size).unwrap_or(0.0)
    }

    pub fn ask_size(&self) -> f64 {
        self.ask.map(|l| l.size).unwrap_or(0.0)
    }

    pub fn has_both_sides(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    /// best_ask - best_bid, when both sides exist.
    pub fn spread(&self) -> Option<f64> {
        match (self.bid_price(), self.ask_price()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.bid_price(), self.ask_price()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_milliseconds()
    }

    /// Strictly older than the allowed age.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_millis: u64) -> bool {
        self.age_millis(now) > max_age_millis as i64
    }
}
