//! Per-market engine state.
//!
//! Everything mutable the engine keeps per market lives in this one record,
//! owned by the engine task - no scattered caches. Eviction on market expiry
//! drops the whole record, which is the only thing keeping long-running
//! memory bounded while new slugs are minted every 15 minutes.

use chrono::{DateTime, Utc};

use super::improve::ImproveChoice;
use super::momentum::MomentumTracker;
use crate::domain::{Leg, Market};

#[derive(Debug)]
pub struct MarketState {
    pub market: Market,
    /// Quoting on a leg is suppressed until this passes.
    hedge_hold_until: [Option<DateTime<Utc>>; 2],
    /// When the planned edge first dropped below the cancel threshold.
    pub edge_below_since: Option<DateTime<Utc>>,
    /// Cached maker-improvement pair.
    pub maker_improve: Option<ImproveChoice>,
    pub momentum: MomentumTracker,
}

impl MarketState {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            hedge_hold_until: [None, None],
            edge_below_since: None,
            maker_improve: None,
            momentum: MomentumTracker::new(),
        }
    }

    pub fn set_hedge_hold(&mut self, leg: Leg, until: DateTime<Utc>) {
        self.hedge_hold_until[leg.index()] = Some(until);
    }

    /// A hold expiring exactly now no longer suppresses.
    pub fn hedge_held(&self, leg: Leg, now: DateTime<Utc>) -> bool {
        match self.hedge_hold_until[leg.index()] {
            Some(until) => until > now,
            None => false,
        }
    }

    pub fn clear_expired_holds(&mut self, now: DateTime<Utc>) {
        for slot in &mut self.hedge_hold_until {
            if matches!(slot, Some(until) if *until <= now) {
                *slot = None;
            }
        }
    }
}
