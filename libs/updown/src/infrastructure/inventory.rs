//! Inventory ledger.
//!
//! Running signed share positions per market and leg with last-fill
//! bookkeeping. Mutations happen only on confirmed fills - the ledger is a
//! pure reducer over fill deltas; cancellations never touch it. A slower
//! reconciliation pass folds exchange-reported positions back in to recover
//! from missed events.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{Leg, Market};
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::exchange::Position;

/// One leg's running position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegPosition {
    pub shares: f64,
    pub cost: f64,
    pub last_fill_at: Option<DateTime<Utc>>,
    pub last_fill_price: Option<f64>,
}

impl LegPosition {
    pub fn avg_price(&self) -> f64 {
        if self.shares.abs() < 1e-9 {
            0.0
        } else {
            self.cost / self.shares
        }
    }
}

/// Per-market inventory record.
#[derive(Debug, Clone, Default)]
pub struct MarketInventory {
    pub up: LegPosition,
    pub down: LegPosition,
    pub last_top_up_at: Option<DateTime<Utc>>,
}

impl MarketInventory {
    pub fn leg(&self, leg: Leg) -> &LegPosition {
        match leg {
            Leg::Up => &self.up,
            Leg::Down => &self.down,
        }
    }

    fn leg_mut(&mut self, leg: Leg) -> &mut LegPosition {
        match leg {
            Leg::Up => &mut self.up,
            Leg::Down => &mut self.down,
        }
    }

    /// Signed: positive means UP-heavy.
    pub fn imbalance(&self) -> f64 {
        self.up.shares - self.down.shares
    }

    /// The leg with more shares; `None` when balanced.
    pub fn heavy_leg(&self) -> Option<Leg> {
        let imb = self.imbalance();
        if imb > 1e-9 {
            Some(Leg::Up)
        } else if imb < -1e-9 {
            Some(Leg::Down)
        } else {
            None
        }
    }

    pub fn cost_basis(&self) -> f64 {
        self.up.cost.max(0.0) + self.down.cost.max(0.0)
    }
}

pub struct InventoryLedger {
    clock: SharedClock,
    inner: RwLock<HashMap<String, MarketInventory>>,
}

impl InventoryLedger {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a confirmed fill. `signed_shares` is positive for buys.
    pub fn record_fill(
        &self,
        slug: &str,
        leg: Leg,
        signed_shares: f64,
        price: f64,
        ts: DateTime<Utc>,
    ) {
        let mut inner = self.inner.write();
        let inv = inner.entry(slug.to_string()).or_default();
        let pos = inv.leg_mut(leg);
        pos.shares += signed_shares;
        pos.cost += signed_shares * price;
        pos.last_fill_at = Some(ts);
        pos.last_fill_price = Some(price);
        let shares = pos.shares;

        debug!(
            "[Inventory] {} {} {:+.2} @ {:.3} -> {:.2} shares (imbalance {:+.2})",
            slug,
            leg,
            signed_shares,
            price,
            shares,
            inv.imbalance()
        );
    }

    pub fn snapshot(&self, slug: &str) -> MarketInventory {
        self.inner.read().get(slug).cloned().unwrap_or_default()
    }

    pub fn imbalance(&self, slug: &str) -> f64 {
        self.inner
            .read()
            .get(slug)
            .map(|inv| inv.imbalance())
            .unwrap_or(0.0)
    }

    pub fn mark_top_up(&self, slug: &str) {
        let now = self.clock.now();
        self.inner
            .write()
            .entry(slug.to_string())
            .or_default()
            .last_top_up_at = Some(now);
    }

    /// Total long cost basis across markets; feeds the global exposure cap.
    pub fn total_cost_basis(&self) -> f64 {
        self.inner
            .read()
            .values()
            .map(|inv| inv.cost_basis())
            .sum()
    }

    /// Drop a market's record on expiry.
    pub fn evict(&self, slug: &str) {
        if self.inner.write().remove(slug).is_some() {
            debug!("[Inventory] Evicted {}", slug);
        }
    }

    /// Reconcile exchange-reported positions into the ledger. Share counts
    /// are overwritten from the report; fill timestamps are kept because the
    /// exchange does not echo them.
    pub fn sync_positions(&self, markets: &[Market], positions: &[Position]) {
        let by_token: HashMap<&str, &Position> = positions
            .iter()
            .map(|p| (p.token_id.as_str(), p))
            .collect();

        let mut inner = self.inner.write();
        let mut adjusted = 0usize;
        for market in markets {
            let inv = inner.entry(market.slug.clone()).or_default();
            for leg in Leg::BOTH {
                if let Some(pos) = by_token.get(market.token(leg)) {
                    let local = inv.leg_mut(leg);
                    if (local.shares - pos.shares).abs() > 1e-6 {
                        debug!(
                            "[Inventory] Sync {} {}: local {:.2} -> exchange {:.2}",
                            market.slug, leg, local.shares, pos.shares
                        );
                        local.shares = pos.shares;
                        local.cost = pos.shares * pos.avg_price;
                        adjusted += 1;
                    }
                }
            }
        }
        if adjusted > 0 {
            info!("[Inventory] Reconciled {} leg position(s)", adjusted);
        }
    }
}
