//! Bankroll service.
//!
//! Tracks exchange balances with EMA smoothing, derives the effective
//! bankroll per the configured mode, and drives the circuit breaker and the
//! dynamic sizing multiplier.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chrono::{DateTime, Utc};

use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::config::{BankrollConfig, BankrollMode, DynamicSizingConfig};
use crate::infrastructure::exchange::ExchangeAdapter;

/// A snapshot older than this is unusable and falls back to the fixed value.
const MAX_SNAPSHOT_AGE_MILLIS: i64 = 60_000;

#[derive(Debug, Clone, Copy)]
pub struct BankrollSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub usdc: f64,
    pub equity: f64,
    pub smoothed_usdc: f64,
    pub smoothed_equity: f64,
}

pub struct BankrollService {
    cfg: BankrollConfig,
    clock: SharedClock,
    snapshot: RwLock<Option<BankrollSnapshot>>,
}

impl BankrollService {
    pub fn new(cfg: BankrollConfig, clock: SharedClock) -> Self {
        Self {
            cfg,
            clock,
            snapshot: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &BankrollConfig {
        &self.cfg
    }

    pub fn snapshot(&self) -> Option<BankrollSnapshot> {
        *self.snapshot.read()
    }

    /// Fold a fresh observation into the smoothed values.
    pub fn observe(&self, usdc: f64, equity: f64) {
        let alpha = self.cfg.smoothing_alpha.clamp(0.01, 1.0);
        let now = self.clock.now();
        let mut guard = self.snapshot.write();

        let (smoothed_usdc, smoothed_equity) = match *guard {
            Some(prev) => (
                alpha * usdc + (1.0 - alpha) * prev.smoothed_usdc,
                alpha * equity + (1.0 - alpha) * prev.smoothed_equity,
            ),
            None => (usdc, equity),
        };

        *guard = Some(BankrollSnapshot {
            fetched_at: now,
            usdc,
            equity,
            smoothed_usdc,
            smoothed_equity,
        });

        debug!(
            "[Bankroll] observed usdc=${:.2} equity=${:.2} smoothed=(${:.2}, ${:.2})",
            usdc, equity, smoothed_usdc, smoothed_equity
        );
    }

    /// Effective bankroll: clamped trading fraction times the mode's source
    /// value. A stale or non-positive candidate falls back to the configured
    /// fixed bankroll.
    pub fn effective(&self) -> f64 {
        let fraction = self.cfg.trading_fraction.clamp(0.0, 1.0);

        let source = match self.cfg.mode {
            BankrollMode::Fixed => Some(self.cfg.bankroll_usd),
            BankrollMode::AutoCash | BankrollMode::AutoEquity => {
                let now = self.clock.now();
                self.snapshot.read().and_then(|snap| {
                    let age = (now - snap.fetched_at).num_milliseconds();
                    if age > MAX_SNAPSHOT_AGE_MILLIS {
                        return None;
                    }
                    let candidate = match self.cfg.mode {
                        BankrollMode::AutoCash => snap.smoothed_usdc,
                        _ => snap.smoothed_equity,
                    };
                    if candidate <= 0.0 {
                        None
                    } else {
                        Some(candidate)
                    }
                })
            }
        };

        fraction * source.unwrap_or(self.cfg.bankroll_usd)
    }

    /// Circuit breaker: below the threshold the engine stops placing new
    /// orders but keeps processing fills.
    pub fn circuit_open(&self) -> bool {
        let open = self.effective() < self.cfg.min_threshold;
        if open {
            warn!(
                "[Bankroll] Circuit open: effective ${:.2} < threshold ${:.2}",
                self.effective(),
                self.cfg.min_threshold
            );
        }
        open
    }

    /// `clamp(actual/reference, min, max)` when dynamic sizing is enabled.
    pub fn dynamic_multiplier(&self, ds: &DynamicSizingConfig) -> f64 {
        if !ds.enabled {
            return 1.0;
        }
        let reference = if ds.reference_bankroll_usd > 0.0 {
            ds.reference_bankroll_usd
        } else {
            self.cfg.bankroll_usd
        };
        if reference <= 0.0 {
            return 1.0;
        }
        (self.effective() / reference).clamp(ds.min_multiplier, ds.max_multiplier)
    }

    /// One refresh from the exchange.
    pub async fn refresh(&self, adapter: &dyn ExchangeAdapter) -> anyhow::Result<()> {
        let bankroll = adapter.bankroll().await?;
        self.observe(bankroll.usdc, bankroll.equity);
        Ok(())
    }

    /// Background refresh loop at `refresh_millis`.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        adapter: Arc<dyn ExchangeAdapter>,
        shutdown_flag: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = Duration::from_millis(self.cfg.refresh_millis.max(500));

        tokio::spawn(async move {
            info!("[Bankroll] Refresh task started ({:?} interval)", interval);
            while shutdown_flag.load(Ordering::Acquire) {
                if let Err(e) = service.refresh(adapter.as_ref()).await {
                    warn!("[Bankroll] Refresh failed: {}", e);
                }
                tokio::time::sleep(interval).await;
            }
            info!("[Bankroll] Refresh task stopped");
        })
    }
}
