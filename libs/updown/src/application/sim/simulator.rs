//! Paper-fill simulator.
//!
//! An order-matching stand-in for the live exchange, driven by the same book
//! feed the engine reads. Taker orders fill against the opposing top-of-book
//! at placement; maker orders wait in a modeled queue and fill per poll with
//! a probability shaped by price improvement, visible depth, and a random
//! queue factor - or against real tape prints when the tape is enabled. A
//! per-market lead/lag floor keeps paired-leg fills realistically staggered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::tape::{TapePrint, TradeTape};
use crate::domain::price::{is_tick_multiple, quantize_size_down, ticks_between, PRICE_EPSILON};
use crate::domain::{Leg, Market, Order, OrderStatus, Side, TopOfBook};
use crate::infrastructure::book_feed::BookFeed;
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::config::{SimConfig, TradeTapeConfig};
use crate::infrastructure::events::{
    EngineEvent, EventPublisher, OrderStatusEvent, SimFillKind, StatusDedup, UserTradeEvent,
};
use crate::infrastructure::exchange::{
    Bankroll, ExchangeAdapter, ExchangeError, ExecutionMode, OrderQuery, PlacedOrder, Position,
};

/// Terminal orders are kept queryable this long before pruning.
const TERMINAL_RETENTION_MILLIS: i64 = 60_000;

/// Attenuation per tick behind the best bid.
const BEHIND_BID_ATTENUATION: f64 = 0.25;

struct SimOrder {
    order: Order,
    queue_factor: f64,
    queue_ahead: f64,
    terminal_at: Option<DateTime<Utc>>,
}

/// Outcome of one fill attempt on one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillOutcome {
    Filled(SimFillKind),
    /// Eligible but held back, with the gate that held it.
    Held(&'static str),
    /// Not eligible this poll.
    Skipped,
}

#[derive(Default)]
struct SimInner {
    orders: HashMap<String, SimOrder>,
    /// token -> (market slug, leg); fed by `register_market`
    tokens: HashMap<String, (String, Leg)>,
    tick_sizes: HashMap<String, f64>,
    /// slug -> (leg, ts) of the most recent fill; drives the lead/lag floor
    last_fill: HashMap<String, (Leg, DateTime<Utc>)>,
    /// token -> (shares, cost) backing `positions()`
    positions: HashMap<String, (f64, f64)>,
    /// token -> last time the tape produced a print for it
    tape_seen: HashMap<String, DateTime<Utc>>,
    /// token -> newest print timestamp already applied
    tape_cursor: HashMap<String, DateTime<Utc>>,
    dedup: StatusDedup,
    next_id: u64,
}

pub struct PaperSimulator {
    cfg: SimConfig,
    tape_cfg: TradeTapeConfig,
    clock: SharedClock,
    feed: Arc<BookFeed>,
    publisher: EventPublisher,
    tape: Option<Arc<dyn TradeTape>>,
    rng: Mutex<StdRng>,
    inner: Mutex<SimInner>,
}

impl PaperSimulator {
    pub fn new(
        cfg: SimConfig,
        tape_cfg: TradeTapeConfig,
        clock: SharedClock,
        feed: Arc<BookFeed>,
        publisher: EventPublisher,
        tape: Option<Arc<dyn TradeTape>>,
        rng_seed: Option<u64>,
    ) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            cfg,
            tape_cfg,
            clock,
            feed,
            publisher,
            tape,
            rng: Mutex::new(rng),
            inner: Mutex::new(SimInner::default()),
        }
    }

    /// Teach the simulator a market's token pairing; required for the
    /// lead/lag floor on that market.
    pub fn register_market(&self, market: &Market) {
        let mut inner = self.inner.lock();
        for leg in Leg::BOTH {
            inner
                .tokens
                .insert(market.token(leg).to_string(), (market.slug.clone(), leg));
        }
    }

    pub fn set_tick_size(&self, token: &str, tick: f64) {
        self.inner.lock().tick_sizes.insert(token.to_string(), tick);
    }

    /// One fill-poll pass over all live orders.
    pub fn poll_fills(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        self.prune_terminal(&mut inner, now);

        let live_ids: Vec<String> = inner
            .orders
            .iter()
            .filter(|(_, o)| o.order.is_live())
            .map(|(id, _)| id.clone())
            .collect();

        for order_id in live_ids {
            let token = match inner.orders.get(&order_id) {
                Some(o) => o.order.token_id.clone(),
                None => continue,
            };
            let Some(book) = self.feed.top_of_book(&token) else {
                continue;
            };
            if book.is_stale(now, self.cfg.tob_max_age_millis) {
                continue;
            }
            if let FillOutcome::Held(gate) = self.try_fill(&mut inner, &order_id, &book, now) {
                debug!("[Sim] {} held by {}", order_id, gate);
            }
        }
    }

    /// One tape pass: pull prints for tokens with live orders, apply oldest
    /// first.
    pub async fn poll_tape(&self) -> anyhow::Result<()> {
        if !self.tape_cfg.enabled {
            return Ok(());
        }
        let Some(tape) = self.tape.clone() else {
            return Ok(());
        };

        let tokens: Vec<String> = {
            let inner = self.inner.lock();
            let mut tokens: Vec<String> = inner
                .orders
                .values()
                .filter(|o| o.order.is_live())
                .map(|o| o.order.token_id.clone())
                .collect();
            tokens.sort();
            tokens.dedup();
            tokens
        };
        if tokens.is_empty() {
            return Ok(());
        }

        let mut prints = tape
            .recent_prints(&tokens, self.tape_cfg.lookback_seconds, self.tape_cfg.limit)
            .await?;
        prints.sort_by_key(|p| p.ts);

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        for print in prints {
            let already_applied = inner
                .tape_cursor
                .get(&print.token_id)
                .map(|cursor| print.ts <= *cursor)
                .unwrap_or(false);
            if already_applied {
                continue;
            }
            inner
                .tape_cursor
                .insert(print.token_id.clone(), print.ts);
            inner.tape_seen.insert(print.token_id.clone(), now);
            self.apply_print(&mut inner, &print, now);
        }
        Ok(())
    }

    /// Background fill-poll loop at `fill_poll_millis`.
    pub fn spawn_fill_task(self: &Arc<Self>, shutdown_flag: Arc<AtomicBool>) -> JoinHandle<()> {
        let sim = Arc::clone(self);
        let interval = Duration::from_millis(sim.cfg.fill_poll_millis.max(50));
        tokio::spawn(async move {
            info!("[Sim] Fill poll started ({:?})", interval);
            while shutdown_flag.load(Ordering::Acquire) {
                sim.poll_fills();
                tokio::time::sleep(interval).await;
            }
            info!("[Sim] Fill poll stopped");
        })
    }

    /// Background tape loop at `tape.poll_millis`.
    pub fn spawn_tape_task(self: &Arc<Self>, shutdown_flag: Arc<AtomicBool>) -> JoinHandle<()> {
        let sim = Arc::clone(self);
        let interval = Duration::from_millis(sim.tape_cfg.poll_millis.max(100));
        tokio::spawn(async move {
            info!("[Sim] Tape poll started ({:?})", interval);
            while shutdown_flag.load(Ordering::Acquire) {
                if let Err(e) = sim.poll_tape().await {
                    warn!("[Sim] Tape poll failed: {}", e);
                }
                tokio::time::sleep(interval).await;
            }
            info!("[Sim] Tape poll stopped");
        })
    }

    // =========================================================================
    // Fill mechanics
    // =========================================================================

    fn try_fill(
        &self,
        inner: &mut SimInner,
        order_id: &str,
        book: &TopOfBook,
        now: DateTime<Utc>,
    ) -> FillOutcome {
        let Some(sim_order) = inner.orders.get(order_id) else {
            return FillOutcome::Skipped;
        };
        let order = sim_order.order.clone();
        let queue_factor = sim_order.queue_factor;
        let remaining = order.remaining();
        if remaining < 0.01 - PRICE_EPSILON {
            return FillOutcome::Skipped;
        }

        let tick = inner
            .tick_sizes
            .get(&order.token_id)
            .copied()
            .unwrap_or(0.01);

        // Same-side and opposing best levels from the order's perspective
        let (same, same_size, opposing) = match order.side {
            Side::Buy => (book.bid_price(), book.bid_size(), book.ask_price()),
            Side::Sell => (book.ask_price(), book.ask_size(), book.bid_price()),
        };

        // Crossed book: both sides exist and ask <= bid
        if let (Some(bid), Some(ask)) = (book.bid_price(), book.ask_price()) {
            if ask <= bid + PRICE_EPSILON {
                if !self.lead_lag_ok(inner, &order.token_id, now) {
                    return FillOutcome::Held("lead-lag floor");
                }
                self.fill_order(
                    inner,
                    order_id,
                    remaining,
                    order.limit_price,
                    SimFillKind::MakerCross,
                    now,
                );
                return FillOutcome::Filled(SimFillKind::MakerCross);
            }
        }

        // Order crosses the opposing side: taker fill at the opposing price
        if let Some(opp) = opposing {
            let crosses = match order.side {
                Side::Buy => order.limit_price >= opp - PRICE_EPSILON,
                Side::Sell => order.limit_price <= opp + PRICE_EPSILON,
            };
            if crosses {
                if !self.lead_lag_ok(inner, &order.token_id, now) {
                    return FillOutcome::Held("lead-lag floor");
                }
                self.fill_order(inner, order_id, remaining, opp, SimFillKind::Taker, now);
                return FillOutcome::Filled(SimFillKind::Taker);
            }
        }

        // Probabilistic maker path
        if order.age_millis(now) < self.cfg.maker_fill_min_age_millis as i64 {
            return FillOutcome::Held("minimum maker age");
        }
        let Some(same_price) = same else {
            return FillOutcome::Skipped; // one-sided toward us: nothing to model against
        };

        // Signed improvement in ticks relative to our side's best
        let ticks_above = match order.side {
            Side::Buy => ticks_between(same_price, order.limit_price, tick),
            Side::Sell => ticks_between(order.limit_price, same_price, tick),
        };

        let tape_active = self.tape_cfg.enabled && self.tape.is_some();
        let fallback = tape_active && self.tape_fallback_eligible(inner, &order.token_id, now);
        if tape_active && !fallback && ticks_above <= 0 {
            // At or behind the touch with a live tape: tape-consumer only
            return FillOutcome::Skipped;
        }

        let depth_ratio = if remaining > 0.0 {
            (same_size / remaining).min(1.0)
        } else {
            0.0
        };
        let base = self.cfg.maker_fill_probability;
        let mut p = if ticks_above >= 0 {
            base * self.cfg.maker_fill_multiplier.powi(ticks_above as i32)
        } else {
            base * BEHIND_BID_ATTENUATION.powi((-ticks_above) as i32)
        };
        p *= depth_ratio * queue_factor;
        if fallback {
            p *= self.tape_cfg.fallback_probability_factor;
        }
        p = p.min(self.cfg.maker_fill_max_probability).clamp(0.0, 1.0);

        if !self.rng.lock().gen_bool(p) {
            return FillOutcome::Skipped;
        }
        if !self.lead_lag_ok(inner, &order.token_id, now) {
            return FillOutcome::Held("lead-lag floor");
        }

        let qty = fill_quantity(remaining, self.cfg.maker_fill_fraction_of_remaining);
        let kind = if fallback {
            SimFillKind::MakerTapeFallback
        } else {
            SimFillKind::Maker
        };
        self.fill_order(inner, order_id, qty, order.limit_price, kind, now);
        FillOutcome::Filled(kind)
    }

    /// Walk a tape print through resting opposite-side orders, oldest first.
    fn apply_print(&self, inner: &mut SimInner, print: &TapePrint, now: DateTime<Utc>) {
        let tick = inner
            .tick_sizes
            .get(&print.token_id)
            .copied()
            .unwrap_or(0.01);
        // Eligibility anchors to the current best bid, not the print's price
        let Some(book) = self.feed.top_of_book(&print.token_id) else {
            return;
        };

        let mut candidates: Vec<(DateTime<Utc>, String)> = inner
            .orders
            .iter()
            .filter(|(_, o)| {
                o.order.token_id == print.token_id
                    && o.order.is_live()
                    && o.order.maker_at_placement
                    && o.order.side != print.side
            })
            .map(|(id, o)| (o.order.created_at, id.clone()))
            .collect();
        candidates.sort();

        let mut print_remaining = print.size;
        for (created_at, order_id) in candidates {
            if print_remaining < 0.01 {
                break;
            }
            if self.tape_cfg.use_trade_timestamp && print.ts < created_at {
                continue;
            }

            let (limit_price, remaining, side) = match inner.orders.get(&order_id) {
                Some(o) => (o.order.limit_price, o.order.remaining(), o.order.side),
                None => continue,
            };

            let behind = match side {
                Side::Buy => book
                    .bid_price()
                    .map(|bid| ticks_between(limit_price, bid, tick)),
                Side::Sell => book
                    .ask_price()
                    .map(|ask| ticks_between(ask, limit_price, tick)),
            };
            let Some(ticks_behind) = behind else {
                continue;
            };
            if ticks_behind > self.tape_cfg.bid_delta_max_ticks {
                continue;
            }

            if !self.lead_lag_ok(inner, &print.token_id, now) {
                continue;
            }

            // Queue ahead of us consumes the print first
            let consumed = {
                let Some(o) = inner.orders.get_mut(&order_id) else {
                    continue;
                };
                let consumed = o.queue_ahead.min(print_remaining);
                o.queue_ahead -= consumed;
                consumed
            };
            print_remaining -= consumed;
            if print_remaining < 0.01 {
                continue;
            }

            let qty = fill_quantity(remaining, self.cfg.maker_fill_fraction_of_remaining)
                .min(quantize_size_down(print_remaining));
            if qty < 0.01 {
                continue;
            }
            let ts = if self.tape_cfg.use_trade_timestamp {
                print.ts.max(now)
            } else {
                now
            };
            self.fill_order(inner, &order_id, qty, limit_price, SimFillKind::MakerTape, ts);
            print_remaining -= qty;
        }
    }

    /// Token silent on the tape long enough to fall back to probabilistic.
    fn tape_fallback_eligible(&self, inner: &SimInner, token: &str, now: DateTime<Utc>) -> bool {
        match inner.tape_seen.get(token) {
            Some(seen) => {
                (now - *seen).num_milliseconds() >= self.tape_cfg.fallback_after_millis as i64
            }
            None => true,
        }
    }

    fn lead_lag_ok(&self, inner: &SimInner, token: &str, now: DateTime<Utc>) -> bool {
        let Some((slug, leg)) = inner.tokens.get(token) else {
            return true; // unregistered market: no pairing to enforce
        };
        match inner.last_fill.get(slug) {
            Some((last_leg, ts)) if last_leg != leg => {
                (now - *ts).num_milliseconds() >= self.cfg.lead_lag_min_millis as i64
            }
            _ => true,
        }
    }

    fn fill_order(
        &self,
        inner: &mut SimInner,
        order_id: &str,
        qty: f64,
        price: f64,
        kind: SimFillKind,
        now: DateTime<Utc>,
    ) {
        let order = {
            let Some(sim_order) = inner.orders.get_mut(order_id) else {
                return;
            };
            sim_order.order.apply_match(qty);
            if sim_order.order.status.is_terminal() {
                sim_order.terminal_at = Some(now);
            }
            sim_order.order.clone()
        };

        let signed = match order.side {
            Side::Buy => qty,
            Side::Sell => -qty,
        };
        let position = inner.positions.entry(order.token_id.clone()).or_insert((0.0, 0.0));
        position.0 += signed;
        position.1 += signed * price;

        let pairing = inner.tokens.get(&order.token_id).cloned();
        if let Some((slug, leg)) = &pairing {
            inner.last_fill.insert(slug.clone(), (*leg, now));
        }

        debug!(
            "[Sim] Fill {} {} {:.2} @ {:.3} ({}, matched {:.2}/{:.2})",
            order.side,
            &order.token_id[..12.min(order.token_id.len())],
            qty,
            price,
            kind,
            order.matched,
            order.requested_size
        );

        self.emit_status(inner, &order, None);
        self.publisher.publish(EngineEvent::UserTrade(UserTradeEvent {
            market: pairing.map(|(slug, _)| slug).unwrap_or_default(),
            token_id: order.token_id.clone(),
            side: order.side,
            price,
            size: qty,
            ts: now,
            sim_kind: Some(kind),
        }));
    }

    fn emit_status(&self, inner: &mut SimInner, order: &Order, error: Option<String>) {
        let event = OrderStatusEvent {
            order_id: order.order_id.clone(),
            token_id: order.token_id.clone(),
            side: order.side,
            requested_price: order.limit_price,
            requested_size: order.requested_size,
            status: order.status.to_string(),
            matched: order.matched,
            remaining: order.remaining(),
            error,
            ts: self.clock.now(),
        };
        if inner.dedup.should_emit(&event) {
            self.publisher.publish(EngineEvent::OrderStatus(event));
        }
    }

    fn prune_terminal(&self, inner: &mut SimInner, now: DateTime<Utc>) {
        let expired: Vec<String> = inner
            .orders
            .iter()
            .filter(|(_, o)| {
                matches!(o.terminal_at, Some(t) if (now - t).num_milliseconds() > TERMINAL_RETENTION_MILLIS)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            inner.orders.remove(&id);
            inner.dedup.forget(&id);
        }
    }
}

/// Fraction of remaining, floor-quantized to 2 decimals, never below the
/// exchange minimum, never above remaining.
fn fill_quantity(remaining: f64, fraction: f64) -> f64 {
    let mut qty = quantize_size_down(remaining * fraction.clamp(0.0, 1.0));
    if qty < 0.01 {
        qty = 0.01;
    }
    qty.min(quantize_size_down(remaining).max(0.01))
}

#[async_trait]
impl ExchangeAdapter for PaperSimulator {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Paper
    }

    async fn place_limit(
        &self,
        token_id: &str,
        side: Side,
        price: f64,
        size: f64,
    ) -> Result<PlacedOrder, ExchangeError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let tick = inner.tick_sizes.get(token_id).copied().unwrap_or(0.01);
        if price <= 0.0 + PRICE_EPSILON
            || price >= 1.0 - PRICE_EPSILON
            || !is_tick_multiple(price, tick)
        {
            return Err(ExchangeError::InvalidPrice(price));
        }
        let quantized = quantize_size_down(size);
        if quantized < 0.01 || (size - quantized).abs() > 1e-6 {
            return Err(ExchangeError::InvalidSize(size));
        }

        inner.next_id += 1;
        let order_id = format!("sim-{}", inner.next_id);

        let book = self.feed.top_of_book(token_id);

        // Maker iff strictly better than the opposing top-of-book; a missing
        // opposing side is assumed maker.
        let maker = match (&book, side) {
            (Some(b), Side::Buy) => b.ask_price().map(|ask| price < ask - PRICE_EPSILON).unwrap_or(true),
            (Some(b), Side::Sell) => b.bid_price().map(|bid| price > bid + PRICE_EPSILON).unwrap_or(true),
            (None, _) => true,
        };

        let (queue_factor, queue_ahead) = if maker {
            let factor = self
                .rng
                .lock()
                .gen_range(self.cfg.maker_queue_factor_min..=self.cfg.maker_queue_factor_max);
            let same_best = book.as_ref().and_then(|b| match side {
                Side::Buy => b.bid.map(|l| (l.price, l.size)),
                Side::Sell => b.ask.map(|l| (l.price, l.size)),
            });
            let ahead = match same_best {
                Some((best_price, best_size)) => {
                    let improved = match side {
                        Side::Buy => price > best_price + PRICE_EPSILON,
                        Side::Sell => price < best_price - PRICE_EPSILON,
                    };
                    if improved {
                        0.0
                    } else {
                        best_size * factor
                    }
                }
                None => 0.0,
            };
            (factor, ahead)
        } else {
            (1.0, 0.0)
        };

        let order = Order {
            order_id: order_id.clone(),
            token_id: token_id.to_string(),
            side,
            limit_price: price,
            requested_size: quantized,
            matched: 0.0,
            status: OrderStatus::Open,
            created_at: now,
            maker_at_placement: maker,
        };
        inner.orders.insert(
            order_id.clone(),
            SimOrder {
                order: order.clone(),
                queue_factor,
                queue_ahead,
                terminal_at: None,
            },
        );

        self.emit_status(&mut inner, &order, None);

        // Non-maker orders fill immediately at the opposing top-of-book,
        // provided the lead/lag floor allows it
        if !maker {
            let opposing = book.as_ref().and_then(|b| match side {
                Side::Buy => b.ask_price(),
                Side::Sell => b.bid_price(),
            });
            if let Some(opp) = opposing {
                if self.lead_lag_ok(&inner, token_id, now) {
                    self.fill_order(&mut inner, &order_id, quantized, opp, SimFillKind::Taker, now);
                }
            }
        }

        let placed = match inner.orders.get(&order_id) {
            Some(o) => PlacedOrder {
                order_id: order_id.clone(),
                status: o.order.status,
                matched: o.order.matched,
                remaining: o.order.remaining(),
                mode: ExecutionMode::Paper,
                raw: Some(serde_json::json!({
                    "orderId": order_id,
                    "status": o.order.status.to_string(),
                    "makerAtPlacement": o.order.maker_at_placement,
                })),
            },
            None => PlacedOrder {
                order_id,
                status: OrderStatus::Open,
                matched: 0.0,
                remaining: quantized,
                mode: ExecutionMode::Paper,
                raw: None,
            },
        };
        Ok(placed)
    }

    async fn cancel(&self, order_id: &str) -> Result<bool, ExchangeError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let canceled = {
            let Some(sim_order) = inner.orders.get_mut(order_id) else {
                return Ok(false); // unknown: idempotent no-op success
            };
            if sim_order.order.status.is_terminal() {
                return Ok(false);
            }
            sim_order.order.status = OrderStatus::Canceled;
            sim_order.terminal_at = Some(now);
            sim_order.order.clone()
        };
        self.emit_status(&mut inner, &canceled, None);
        Ok(true)
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderQuery, ExchangeError> {
        let inner = self.inner.lock();
        match inner.orders.get(order_id) {
            Some(o) => Ok(OrderQuery {
                status: o.order.status,
                matched: o.order.matched,
                remaining: o.order.remaining(),
            }),
            None => Err(ExchangeError::Rejected(format!("unknown order {}", order_id))),
        }
    }

    async fn tick_size(&self, token_id: &str) -> Result<f64, ExchangeError> {
        Ok(self
            .inner
            .lock()
            .tick_sizes
            .get(token_id)
            .copied()
            .unwrap_or(0.01))
    }

    async fn bankroll(&self) -> Result<Bankroll, ExchangeError> {
        // Paper balances are flat; PnL accounting lives with the consumer
        Ok(Bankroll {
            usdc: self.cfg.paper_bankroll_usd,
            equity: self.cfg.paper_bankroll_usd,
        })
    }

    async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let inner = self.inner.lock();
        Ok(inner
            .positions
            .iter()
            .filter(|(_, (shares, _))| shares.abs() > 1e-9)
            .map(|(token, (shares, cost))| Position {
                token_id: token.clone(),
                shares: *shares,
                avg_price: if shares.abs() > 1e-9 { cost / shares } else { 0.0 },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookLevel, SeriesKey};
    use crate::infrastructure::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use crossbeam_channel::Receiver;

    fn market() -> Market {
        Market {
            slug: "btc-updown-15m-t".to_string(),
            up_token: "up".to_string(),
            down_token: "down".to_string(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 15, 0).unwrap(),
            series: SeriesKey::Btc15m,
        }
    }

    fn setup(
        cfg: SimConfig,
        tape_cfg: TradeTapeConfig,
        tape: Option<Arc<dyn TradeTape>>,
    ) -> (
        Arc<ManualClock>,
        Arc<BookFeed>,
        Arc<PaperSimulator>,
        Receiver<EngineEvent>,
    ) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let feed = Arc::new(BookFeed::new(clock.clone()));
        let (publisher, rx) = EventPublisher::new();
        let sim = Arc::new(PaperSimulator::new(
            cfg,
            tape_cfg,
            clock.clone(),
            feed.clone(),
            publisher,
            tape,
            Some(42),
        ));
        sim.register_market(&market());
        feed.subscribe(&["up".to_string(), "down".to_string()]);
        (clock, feed, sim, rx)
    }

    fn seed_books(feed: &BookFeed) {
        feed.apply_quote(
            "up",
            Some(BookLevel::new(0.48, 100.0)),
            Some(BookLevel::new(0.50, 80.0)),
        );
        feed.apply_quote(
            "down",
            Some(BookLevel::new(0.48, 100.0)),
            Some(BookLevel::new(0.50, 80.0)),
        );
    }

    fn certain_fill_cfg() -> SimConfig {
        SimConfig {
            maker_fill_probability: 1.0,
            maker_fill_multiplier: 1.0,
            maker_fill_max_probability: 1.0,
            maker_fill_fraction_of_remaining: 1.0,
            maker_queue_factor_min: 1.0,
            maker_queue_factor_max: 1.0,
            maker_fill_min_age_millis: 0,
            lead_lag_min_millis: 2_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_off_tick_price() {
        let (_c, feed, sim, _rx) = setup(SimConfig::default(), TradeTapeConfig::default(), None);
        seed_books(&feed);
        let err = sim.place_limit("up", Side::Buy, 0.483, 10.0).await;
        assert!(matches!(err, Err(ExchangeError::InvalidPrice(_))));

        let err = sim.place_limit("up", Side::Buy, 0.48, 0.005).await;
        assert!(matches!(err, Err(ExchangeError::InvalidSize(_))));
    }

    #[tokio::test]
    async fn test_maker_classification() {
        let (_c, feed, sim, _rx) = setup(SimConfig::default(), TradeTapeConfig::default(), None);
        seed_books(&feed);

        let maker = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        assert_eq!(maker.status, OrderStatus::Open);

        // Crossing the ask fills immediately at the ask
        let taker = sim.place_limit("up", Side::Buy, 0.50, 10.0).await.unwrap();
        assert_eq!(taker.status, OrderStatus::Filled);
        assert!((taker.matched - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_probabilistic_fill_with_certain_config() {
        let (clock, feed, sim, rx) = setup(certain_fill_cfg(), TradeTapeConfig::default(), None);
        seed_books(&feed);

        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        clock.advance_millis(100);
        // Refresh book timestamp so it is not stale
        seed_books(&feed);
        sim.poll_fills();

        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Filled);

        // Events include a trade with the MAKER kind
        let saw_maker_trade = rx.try_iter().any(|e| {
            matches!(e, EngineEvent::UserTrade(t) if t.sim_kind == Some(SimFillKind::Maker))
        });
        assert!(saw_maker_trade);
    }

    #[tokio::test]
    async fn test_min_age_blocks_probabilistic_fill() {
        let mut cfg = certain_fill_cfg();
        cfg.maker_fill_min_age_millis = 5_000;
        let (clock, feed, sim, _rx) = setup(cfg, TradeTapeConfig::default(), None);
        seed_books(&feed);

        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        clock.advance_millis(1_000);
        seed_books(&feed);
        sim.poll_fills();
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Open);

        clock.advance_millis(4_001);
        seed_books(&feed);
        sim.poll_fills();
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_lead_lag_floor_staggers_paired_fills() {
        let (clock, feed, sim, _rx) = setup(certain_fill_cfg(), TradeTapeConfig::default(), None);
        seed_books(&feed);

        // UP leg fills immediately as a taker
        let up = sim.place_limit("up", Side::Buy, 0.50, 10.0).await.unwrap();
        assert_eq!(up.status, OrderStatus::Filled);

        // DOWN taker placed inside the floor: held open
        let down = sim.place_limit("down", Side::Buy, 0.50, 10.0).await.unwrap();
        assert_eq!(down.status, OrderStatus::Open);

        // Still held before the floor passes
        clock.advance_millis(1_000);
        seed_books(&feed);
        sim.poll_fills();
        let q = sim.get_order(&down.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Open);

        // Floor passes: the held taker goes through
        clock.advance_millis(1_000);
        seed_books(&feed);
        sim.poll_fills();
        let q = sim.get_order(&down.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_maker_cross_fills_at_limit_price() {
        let (clock, feed, sim, rx) = setup(certain_fill_cfg(), TradeTapeConfig::default(), None);
        seed_books(&feed);

        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        // Book crosses (ask <= bid)
        feed.apply_quote(
            "up",
            Some(BookLevel::new(0.49, 50.0)),
            Some(BookLevel::new(0.47, 50.0)),
        );
        clock.advance_millis(100);
        sim.poll_fills();

        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Filled);

        let cross = rx.try_iter().find_map(|e| match e {
            EngineEvent::UserTrade(t) if t.sim_kind == Some(SimFillKind::MakerCross) => Some(t),
            _ => None,
        });
        let cross = cross.expect("expected a MAKER_CROSS trade");
        assert!((cross.price - 0.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancel_idempotent() {
        let (_c, feed, sim, _rx) = setup(SimConfig::default(), TradeTapeConfig::default(), None);
        seed_books(&feed);
        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();

        assert!(sim.cancel(&placed.order_id).await.unwrap());
        assert!(!sim.cancel(&placed.order_id).await.unwrap());
        assert!(!sim.cancel("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_positions_track_fills() {
        let (_c, feed, sim, _rx) = setup(SimConfig::default(), TradeTapeConfig::default(), None);
        seed_books(&feed);
        sim.place_limit("up", Side::Buy, 0.50, 10.0).await.unwrap();

        let positions = sim.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].token_id, "up");
        assert!((positions[0].shares - 10.0).abs() < 1e-9);
        assert!((positions[0].avg_price - 0.50).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tape_mode_disables_at_bid_probabilistic() {
        use crate::application::sim::tape::VecTape;

        let tape: Arc<VecTape> = Arc::new(VecTape::new());
        let mut tape_cfg = TradeTapeConfig {
            enabled: true,
            ..Default::default()
        };
        tape_cfg.fallback_after_millis = 60_000;
        let (clock, feed, sim, _rx) = setup(certain_fill_cfg(), tape_cfg, Some(tape.clone()));
        seed_books(&feed);

        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        // Mark the tape alive for this token so fallback stays off
        tape.push(TapePrint {
            ts: clock.now(),
            token_id: "up".to_string(),
            side: Side::Buy, // aggressor buy: does not hit our buy
            price: 0.50,
            size: 1.0,
        });
        sim.poll_tape().await.unwrap();

        clock.advance_millis(500);
        seed_books(&feed);
        sim.poll_fills();
        // At-bid order with a live tape must not fill probabilistically
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_tape_print_consumes_queue_then_fills() {
        use crate::application::sim::tape::VecTape;

        let tape: Arc<VecTape> = Arc::new(VecTape::new());
        let tape_cfg = TradeTapeConfig {
            enabled: true,
            ..Default::default()
        };
        let mut cfg = certain_fill_cfg();
        // Queue factor 1.0 puts bid_size (100) ahead of us at the touch
        cfg.maker_queue_factor_min = 1.0;
        cfg.maker_queue_factor_max = 1.0;
        let (clock, feed, sim, rx) = setup(cfg, tape_cfg, Some(tape.clone()));
        seed_books(&feed);

        let placed = sim.place_limit("up", Side::Buy, 0.48, 10.0).await.unwrap();
        clock.advance_millis(100);

        // First print: smaller than the queue ahead, no fill
        tape.push(TapePrint {
            ts: clock.now(),
            token_id: "up".to_string(),
            side: Side::Sell,
            price: 0.48,
            size: 60.0,
        });
        sim.poll_tape().await.unwrap();
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.matched, 0.0);

        // Second print: drains the rest of the queue and reaches us
        clock.advance_millis(100);
        tape.push(TapePrint {
            ts: clock.now(),
            token_id: "up".to_string(),
            side: Side::Sell,
            price: 0.48,
            size: 50.0,
        });
        sim.poll_tape().await.unwrap();
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert!(q.matched > 0.0);

        let saw_tape_fill = rx.try_iter().any(|e| {
            matches!(e, EngineEvent::UserTrade(t) if t.sim_kind == Some(SimFillKind::MakerTape))
        });
        assert!(saw_tape_fill);
    }

    #[tokio::test]
    async fn test_improved_order_skips_queue() {
        let (clock, feed, sim, _rx) = setup(certain_fill_cfg(), TradeTapeConfig::default(), None);
        seed_books(&feed);

        // One tick above the bid: queue_ahead starts at zero
        let placed = sim.place_limit("up", Side::Buy, 0.49, 10.0).await.unwrap();
        clock.advance_millis(100);
        seed_books(&feed);
        sim.poll_fills();
        let q = sim.get_order(&placed.order_id).await.unwrap();
        assert_eq!(q.status, OrderStatus::Filled);
    }

    #[test]
    fn test_fill_quantity_floor() {
        assert_eq!(fill_quantity(10.0, 0.5), 5.0);
        assert_eq!(fill_quantity(10.0, 1.0), 10.0);
        // Fraction that would round to zero floors at the exchange minimum
        assert_eq!(fill_quantity(0.5, 0.001), 0.01);
        // Never exceeds remaining
        assert_eq!(fill_quantity(0.01, 1.0), 0.01);
    }
}
