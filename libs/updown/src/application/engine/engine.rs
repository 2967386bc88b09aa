//! The directional engine: a per-tick state machine over the active markets.
//!
//! Each tick walks every market through the same gate sequence: expiry and
//! window checks, book freshness, the price band, inventory skew, top-ups,
//! the edge gate, hedge-delay masking, the taker-mode decision, maker
//! improvement, and finally quote-or-replace per leg. A failure inside one
//! market is logged and never stops the others.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hedge::sample_hedge_delay;
use super::improve::{self, ImproveChoice};
use super::momentum::MomentumSignal;
use super::sizing;
use super::state::MarketState;
use super::taker;
use crate::application::discovery::MarketDiscovery;
use crate::application::order_manager::{CancelReason, OrderManager, ReplaceDecision};
use crate::application::quote::{self, SizeContext};
use crate::domain::price::{ticks_between, PRICE_EPSILON};
use crate::domain::{Leg, Market, SeriesKey, Side, TopOfBook};
use crate::infrastructure::bankroll::BankrollService;
use crate::infrastructure::book_feed::BookFeed;
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::events::{DiscoveredMarketsEvent, EngineEvent, EventPublisher};
use crate::infrastructure::exchange::{ExchangeAdapter, TickSizeCache};
use crate::infrastructure::inventory::InventoryLedger;

/// Quotes only run while both bids sit inside this band.
const MIN_BID_BAND: f64 = 0.05;
const MAX_BID_BAND: f64 = 0.95;

/// Notified for every newly-tracked market (the paper runner uses this to
/// register pairings with the simulator).
pub type MarketHook = Box<dyn Fn(&Market) + Send + Sync>;

/// A confirmed fill delta flowing back from the order manager.
#[derive(Debug, Clone)]
struct FillEvent {
    slug: String,
    leg: Leg,
}

pub struct DirectionalEngine {
    cfg: EngineConfig,
    clock: SharedClock,
    feed: Arc<BookFeed>,
    adapter: Arc<dyn ExchangeAdapter>,
    orders: Arc<OrderManager>,
    inventory: Arc<InventoryLedger>,
    bankroll: Arc<BankrollService>,
    discovery: MarketDiscovery,
    publisher: EventPublisher,
    tick_sizes: TickSizeCache,
    states: HashMap<String, MarketState>,
    rng: StdRng,
    last_inventory_sync: Option<DateTime<Utc>>,
    market_hook: Option<MarketHook>,
}

impl DirectionalEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: EngineConfig,
        clock: SharedClock,
        feed: Arc<BookFeed>,
        adapter: Arc<dyn ExchangeAdapter>,
        orders: Arc<OrderManager>,
        inventory: Arc<InventoryLedger>,
        bankroll: Arc<BankrollService>,
        discovery: MarketDiscovery,
        publisher: EventPublisher,
    ) -> Self {
        let rng = match cfg.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tick_sizes = TickSizeCache::new(Arc::clone(&adapter), Arc::clone(&clock));
        Self {
            cfg,
            clock,
            feed,
            adapter,
            orders,
            inventory,
            bankroll,
            discovery,
            publisher,
            tick_sizes,
            states: HashMap::new(),
            rng,
            last_inventory_sync: None,
            market_hook: None,
        }
    }

    /// Install a callback fired once per newly-tracked market.
    pub fn set_market_hook(&mut self, hook: MarketHook) {
        self.market_hook = Some(hook);
    }

    pub fn tracked_markets(&self) -> Vec<Market> {
        self.states.values().map(|st| st.market.clone()).collect()
    }

    /// Main loop: discovery every `discovery.poll_secs`, an engine tick every
    /// `refresh_millis`. Runs until the flag flips, then cancels everything.
    pub async fn run(mut self, shutdown_flag: Arc<AtomicBool>) {
        info!(
            "[Engine] Starting: tick {}ms, discovery {}s, mode {}",
            self.cfg.tick_millis(),
            self.cfg.discovery.poll_secs,
            self.adapter.mode()
        );

        let tick = Duration::from_millis(self.cfg.tick_millis());
        let discovery_every = ChronoDuration::seconds(self.cfg.discovery.poll_secs.max(1) as i64);
        let mut last_discovery: Option<DateTime<Utc>> = None;

        while shutdown_flag.load(Ordering::Acquire) {
            let now = self.clock.now();
            let due = last_discovery
                .map(|t| now - t >= discovery_every)
                .unwrap_or(true);
            if due {
                self.run_discovery().await;
                last_discovery = Some(now);
            }

            self.run_tick().await;
            tokio::time::sleep(tick).await;
        }

        info!("[Engine] Shutting down, cancelling all orders");
        self.orders.cancel_all(CancelReason::Shutdown).await;
        info!("[Engine] Stopped");
    }

    /// One discovery pass: refresh the market set, update the book-feed
    /// subscription atomically, emit the heartbeat, and occasionally
    /// reconcile inventory from exchange positions.
    pub async fn run_discovery(&mut self) {
        let active = self.discovery.refresh().await;

        for market in &active {
            if !self.states.contains_key(&market.slug) {
                info!(
                    "[Engine] Tracking {} (ends {}, series {})",
                    market.slug, market.end_time, market.series
                );
                if let Some(hook) = &self.market_hook {
                    hook(market);
                }
                self.states
                    .insert(market.slug.clone(), MarketState::new(market.clone()));
            }
        }

        let tokens: Vec<String> = self
            .states
            .values()
            .flat_map(|st| {
                [
                    st.market.up_token.clone(),
                    st.market.down_token.clone(),
                ]
            })
            .collect();
        self.feed.subscribe(&tokens);

        self.publisher
            .publish(EngineEvent::DiscoveredMarkets(DiscoveredMarketsEvent {
                slugs: self.states.keys().cloned().collect(),
                ts: self.clock.now(),
            }));

        self.maybe_sync_inventory().await;
    }

    async fn maybe_sync_inventory(&mut self) {
        let now = self.clock.now();
        let due = self
            .last_inventory_sync
            .map(|t| (now - t).num_seconds() >= self.cfg.inventory_sync_secs as i64)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_inventory_sync = Some(now);

        match self.adapter.positions().await {
            Ok(positions) => {
                let markets = self.tracked_markets();
                self.inventory.sync_positions(&markets, &positions);
            }
            Err(e) => warn!("[Engine] Position sync failed: {}", e),
        }
    }

    /// One engine tick. With the circuit open, evaluation is skipped but
    /// pending fills are still reconciled.
    pub async fn run_tick(&mut self) {
        let circuit_open = self.bankroll.circuit_open();

        if self.cfg.enabled && !circuit_open {
            let slugs: Vec<String> = self.states.keys().cloned().collect();
            for slug in slugs {
                self.evaluate_market(&slug).await;
            }
        }

        self.poll_fills().await;
    }

    /// Steps 1-11 for one market. State is taken out of the map for the
    /// duration and reinserted unless the market was evicted.
    async fn evaluate_market(&mut self, slug: &str) {
        let Some(mut st) = self.states.remove(slug) else {
            return;
        };
        let now = self.clock.now();
        let market = st.market.clone();

        // 1. EvictIfExpired
        if market.is_expired(now)
            || market.seconds_to_end(now) < self.cfg.min_seconds_to_end as i64
        {
            info!("[Engine] Evicting {} (past trading window)", market.slug);
            self.cancel_market_orders(&market, CancelReason::MarketExpired)
                .await;
            self.inventory.evict(&market.slug);
            return;
        }
        if market.seconds_to_end(now) > self.cfg.max_seconds_to_end as i64 {
            // Known but not yet inside the window; no orders, caches stay
            self.cancel_market_orders(&market, CancelReason::OutOfWindow)
                .await;
            self.states.insert(slug.to_string(), st);
            return;
        }

        // 2. ReadBooks
        let max_age = self.cfg.sim.tob_max_age_millis;
        let up_book = self.fresh_book(&market.up_token, now, max_age);
        let down_book = self.fresh_book(&market.down_token, now, max_age);
        let (up_book, down_book) = match (up_book, down_book) {
            (Some(u), Some(d)) => (u, d),
            (u, d) => {
                if u.is_none() {
                    self.cancel_leg(&market, Leg::Up, CancelReason::BookStale).await;
                }
                if d.is_none() {
                    self.cancel_leg(&market, Leg::Down, CancelReason::BookStale).await;
                }
                self.states.insert(slug.to_string(), st);
                return;
            }
        };

        // 3. BandFilter
        let (bid_up, bid_down) = match (up_book.bid_price(), down_book.bid_price()) {
            (Some(u), Some(d)) => (u, d),
            _ => {
                self.cancel_market_orders(&market, CancelReason::BookStale).await;
                self.states.insert(slug.to_string(), st);
                return;
            }
        };
        let min_bid = bid_up.min(bid_down);
        let max_bid = bid_up.max(bid_down);
        if min_bid < MIN_BID_BAND - PRICE_EPSILON || max_bid > MAX_BID_BAND + PRICE_EPSILON {
            self.cancel_market_orders(&market, CancelReason::BookOutOfBand)
                .await;
            self.states.insert(slug.to_string(), st);
            return;
        }

        // 4. ComputeInventoryAndSkew
        let inv = self.inventory.snapshot(slug);
        let imbalance = inv.imbalance();
        let (skew_up, skew_down) = quote::skew_ticks(imbalance, &self.cfg);

        if let Some(mid) = up_book.mid() {
            st.momentum.observe(now, mid, &self.cfg.momentum);
        }
        let signal = st.momentum.signal(&self.cfg.momentum);

        let (mf_up, mf_down) = sizing::momentum_factors(&mut self.rng, signal);
        let size_factor_up = sizing::price_level_factor(&mut self.rng, bid_up) * mf_up;
        let size_factor_down = sizing::price_level_factor(&mut self.rng, bid_down) * mf_down;

        let tick_up = match self.tick_sizes.get(&market.up_token).await {
            Ok(t) => t,
            Err(e) => {
                warn!("[Engine] No tick size for {}: {}", market.slug, e);
                self.states.insert(slug.to_string(), st);
                return;
            }
        };
        let tick_down = match self.tick_sizes.get(&market.down_token).await {
            Ok(t) => t,
            Err(e) => {
                warn!("[Engine] No tick size for {}: {}", market.slug, e);
                self.states.insert(slug.to_string(), st);
                return;
            }
        };

        let bankroll = self.bankroll.effective();
        let dyn_mult = self.bankroll.dynamic_multiplier(&self.cfg.dynamic_sizing);
        let exposure = self.orders.open_notional() + self.inventory.total_cost_basis();

        // 5. FastTopUpCheck
        if self.cfg.fast_top_up.enabled {
            let lagging_book = match inv.heavy_leg() {
                Some(Leg::Up) => &down_book,
                _ => &up_book,
            };
            match taker::fast_top_up_check(&self.cfg.fast_top_up, &inv, lagging_book, now) {
                Ok(lagging) => {
                    let base = imbalance.abs() * self.cfg.fast_top_up.fraction;
                    if self
                        .take_leg(&market, lagging, base, bankroll, dyn_mult, exposure, "fast top-up")
                        .await
                    {
                        self.inventory.mark_top_up(slug);
                    }
                }
                Err(hold) => {
                    debug!("[Engine] {} fast top-up held: {:?}", market.slug, hold)
                }
            }
        }

        // 6. NearEndTopUp
        if self.cfg.top_up.enabled
            && market.seconds_to_end(now) <= self.cfg.top_up.seconds_to_end as i64
            && imbalance.abs() >= self.cfg.top_up.min_shares
        {
            // Re-read the top-up stamp: step 5 may have just set it
            let cooled = self
                .inventory
                .snapshot(slug)
                .last_top_up_at
                .map(|t| {
                    (now - t).num_milliseconds() >= self.cfg.fast_top_up.cooldown_millis as i64
                })
                .unwrap_or(true);
            if cooled {
                if let Some(heavy) = inv.heavy_leg() {
                    let lagging = heavy.opposite();
                    if self
                        .take_leg(
                            &market,
                            lagging,
                            imbalance.abs(),
                            bankroll,
                            dyn_mult,
                            exposure,
                            "near-end top-up",
                        )
                        .await
                    {
                        self.inventory.mark_top_up(slug);
                    }
                }
            }
        }

        // 7. EdgeGate - planned prices before improvement
        let base_up = quote::entry_price_buy(&up_book, tick_up, skew_up, 0);
        let base_down = quote::entry_price_buy(&down_book, tick_down, skew_down, 0);
        let (entry_up, entry_down) = match (base_up, base_down) {
            (Some(u), Some(d)) => (u, d),
            _ => {
                self.cancel_market_orders(&market, CancelReason::NoQuote).await;
                self.states.insert(slug.to_string(), st);
                return;
            }
        };
        let planned_edge = 1.0 - (entry_up + entry_down);
        let (entry_threshold, cancel_threshold) = edge_thresholds(&self.cfg, signal);

        if planned_edge < cancel_threshold - PRICE_EPSILON {
            let since = *st.edge_below_since.get_or_insert(now);
            if (now - since).num_milliseconds() >= self.cfg.edge_below_cancel_millis() as i64 {
                info!(
                    "[Engine] {} edge {:.4} below cancel threshold, pulling both legs",
                    market.slug, planned_edge
                );
                self.cancel_market_orders(&market, CancelReason::InsufficientEdge)
                    .await;
                st.edge_below_since = None;
            }
            self.states.insert(slug.to_string(), st);
            return;
        }
        st.edge_below_since = None;

        if planned_edge < entry_threshold - PRICE_EPSILON {
            // Hold: existing orders stay, nothing new goes out
            self.states.insert(slug.to_string(), st);
            return;
        }

        // 8. HedgeDelayMask
        st.clear_expired_holds(now);
        let mut quote_up = !st.hedge_held(Leg::Up, now);
        let mut quote_down = !st.hedge_held(Leg::Down, now);

        // Lagging-leg Bernoulli from the size-skew heuristic
        if quote_up && !sizing::should_quote_leg(&mut self.rng, size_factor_up) {
            quote_up = false;
        }
        if quote_down && !sizing::should_quote_leg(&mut self.rng, size_factor_down) {
            quote_down = false;
        }

        // 9. TakerModeDecision
        if self.cfg.taker_mode.enabled
            && planned_edge <= self.cfg.taker_mode.max_edge + PRICE_EPSILON
        {
            let spreads_ok = up_book
                .spread()
                .zip(down_book.spread())
                .map(|(su, sd)| {
                    su <= self.cfg.taker_mode.max_spread + PRICE_EPSILON
                        && sd <= self.cfg.taker_mode.max_spread + PRICE_EPSILON
                })
                .unwrap_or(false);
            let p = series_taker_probability(self.cfg.taker_mode.probability, market.series);
            if spreads_ok && self.rng.gen_bool(p.clamp(0.0, 1.0)) {
                if let Some(edges) = taker::taker_edges(&up_book, &down_book) {
                    if let Some(leg) =
                        taker::choose_taker_leg(edges, size_factor_up, size_factor_down, imbalance)
                    {
                        let factor = match leg {
                            Leg::Up => size_factor_up,
                            Leg::Down => size_factor_down,
                        };
                        let base = self.cfg.quote_size * dyn_mult * factor;
                        self.take_leg(&market, leg, base, bankroll, dyn_mult, exposure, "taker mode")
                            .await;
                        // The taken leg is done for this tick; the other still quotes maker-style
                        match leg {
                            Leg::Up => quote_up = false,
                            Leg::Down => quote_down = false,
                        }
                    }
                }
            }
        }

        // 10. MakerImprovementPair
        let ask_up = up_book.ask_price().unwrap_or(1.0);
        let ask_down = down_book.ask_price().unwrap_or(1.0);
        let bucket = improve::spread_bucket(
            ticks_between(bid_up, ask_up, tick_up),
            ticks_between(bid_down, ask_down, tick_down),
        );
        let budget_tick = tick_up.min(tick_down);
        let budget =
            ((planned_edge - self.cfg.complete_set_min_edge) / budget_tick + PRICE_EPSILON).floor()
                as i64;

        let valid = st
            .maker_improve
            .map(|c| c.is_valid(now, bucket, self.cfg.force_replace_millis))
            .unwrap_or(false);
        if !valid {
            let (up_ticks, down_ticks) =
                improve::improvement_pair(&mut self.rng, market.series, budget);
            st.maker_improve = Some(ImproveChoice {
                up_ticks,
                down_ticks,
                spread_bucket: bucket,
                sampled_at: now,
            });
        }
        let (improve_up, improve_down) = match st.maker_improve {
            // The budget may have shrunk since the pair was cached
            Some(c) => improve::trim_pair(c.up_ticks, c.down_ticks, budget),
            None => (0, 0),
        };

        // 11. QuoteOrReplace
        let legs = [
            (Leg::Up, quote_up, &up_book, tick_up, skew_up, improve_up, size_factor_up),
            (
                Leg::Down,
                quote_down,
                &down_book,
                tick_down,
                skew_down,
                improve_down,
                size_factor_down,
            ),
        ];
        for (leg, do_quote, book, tick, skew, improve_ticks, size_factor) in legs {
            if !do_quote {
                continue;
            }
            self.quote_leg(
                &market,
                leg,
                book,
                tick,
                skew,
                improve_ticks,
                SizeContext {
                    price: 0.0,
                    bankroll,
                    dynamic_multiplier: dyn_mult,
                    size_skew_factor: size_factor,
                    current_exposure: exposure,
                },
            )
            .await;
        }

        self.states.insert(slug.to_string(), st);
    }

    fn fresh_book(
        &self,
        token: &str,
        now: DateTime<Utc>,
        max_age_millis: u64,
    ) -> Option<TopOfBook> {
        self.feed
            .top_of_book(token)
            .filter(|tob| !tob.is_stale(now, max_age_millis))
    }

    /// Maker quote for one leg: price, size, then keep/skip/replace.
    async fn quote_leg(
        &self,
        market: &Market,
        leg: Leg,
        book: &TopOfBook,
        tick: f64,
        skew_ticks: i32,
        improve_ticks: u32,
        mut ctx: SizeContext,
    ) {
        let token = market.token(leg);

        let Some(price) = quote::entry_price_buy(book, tick, skew_ticks, improve_ticks) else {
            let _ = self.orders.cancel(token, CancelReason::NoQuote).await;
            return;
        };
        ctx.price = price;
        let Some(size) = quote::order_size(&self.cfg, &ctx) else {
            let _ = self.orders.cancel(token, CancelReason::NoQuote).await;
            return;
        };

        match self.orders.replace_decision(token, price, size, &self.cfg) {
            ReplaceDecision::Keep | ReplaceDecision::Skip => {}
            ReplaceDecision::Replace => {
                if self.orders.live_order(token).is_some() {
                    if let Err(e) = self.orders.cancel(token, CancelReason::Replace).await {
                        warn!("[Engine] Replace-cancel failed on {}: {}", market.slug, e);
                        return;
                    }
                }
                let maker = book
                    .ask_price()
                    .map(|ask| price < ask - PRICE_EPSILON)
                    .unwrap_or(true);
                if let Err(e) = self
                    .orders
                    .place_order(token, Side::Buy, price, size, maker)
                    .await
                {
                    warn!("[Engine] Placement failed on {} {}: {}", market.slug, leg, e);
                }
            }
        }
    }

    /// Taker order on a leg at the opposing ask. Returns true when an order
    /// actually went out.
    #[allow(clippy::too_many_arguments)]
    async fn take_leg(
        &self,
        market: &Market,
        leg: Leg,
        base_shares: f64,
        bankroll: f64,
        dynamic_multiplier: f64,
        exposure: f64,
        why: &str,
    ) -> bool {
        let token = market.token(leg);
        let Some(book) = self.feed.top_of_book(token) else {
            return false;
        };
        let tick = match self.tick_sizes.get(token).await {
            Ok(t) => t,
            Err(_) => return false,
        };
        let Some(price) = quote::taker_price_buy(&book, tick) else {
            return false;
        };
        let ctx = SizeContext {
            price,
            bankroll,
            dynamic_multiplier,
            size_skew_factor: 1.0,
            current_exposure: exposure,
        };
        let Some(size) = quote::cap_size(&self.cfg, &ctx, base_shares) else {
            return false;
        };

        if self.orders.live_order(token).is_some() {
            if let Err(e) = self.orders.cancel(token, CancelReason::Replace).await {
                warn!("[Engine] Taker pre-cancel failed on {}: {}", market.slug, e);
                return false;
            }
        }

        info!(
            "[Engine] {} {} on {} {}: {:.2} @ {:.3}",
            why, Side::Buy, market.slug, leg, size, price
        );
        match self
            .orders
            .place_order(token, Side::Buy, price, size, false)
            .await
        {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!("[Engine] Taker order failed on {} {}: {}", market.slug, leg, e);
                false
            }
        }
    }

    /// Reconcile fills into inventory, then apply hedge-delay reactions.
    async fn poll_fills(&mut self) {
        let mapping: HashMap<String, (String, Leg)> = self
            .states
            .values()
            .flat_map(|st| {
                Leg::BOTH.into_iter().map(move |leg| {
                    (
                        st.market.token(leg).to_string(),
                        (st.market.slug.clone(), leg),
                    )
                })
            })
            .collect();

        let inventory = Arc::clone(&self.inventory);
        let clock = Arc::clone(&self.clock);
        let mut fills: Vec<FillEvent> = Vec::new();

        self.orders
            .check_pending_orders(|order, delta| {
                let Some((slug, leg)) = mapping.get(&order.token_id) else {
                    return;
                };
                let signed = match order.side {
                    Side::Buy => delta,
                    Side::Sell => -delta,
                };
                inventory.record_fill(slug, *leg, signed, order.limit_price, clock.now());
                fills.push(FillEvent {
                    slug: slug.clone(),
                    leg: *leg,
                });
            })
            .await;

        for fill in fills {
            self.apply_hedge_delay(fill).await;
        }
    }

    /// With probability `1 - fast_top_up.probability`, pull the opposite
    /// leg's order and hold that leg for a drawn delay.
    async fn apply_hedge_delay(&mut self, fill: FillEvent) {
        if !self.cfg.hedge_delay.enabled {
            return;
        }
        let p_fast = self.cfg.fast_top_up.probability.clamp(0.0, 1.0);
        if !self.rng.gen_bool(1.0 - p_fast) {
            return;
        }

        let now = self.clock.now();
        let opposite = fill.leg.opposite();
        let token = {
            let Some(st) = self.states.get_mut(&fill.slug) else {
                return;
            };
            let delay = sample_hedge_delay(
                &mut self.rng,
                self.cfg.hedge_delay.min_seconds,
                self.cfg.hedge_delay.max_seconds,
            );
            st.set_hedge_hold(opposite, now + delay);
            info!(
                "[Engine] {} hedge delay: holding {} for {:.1}s",
                fill.slug,
                opposite,
                delay.num_milliseconds() as f64 / 1000.0
            );
            st.market.token(opposite).to_string()
        };

        if let Err(e) = self.orders.cancel(&token, CancelReason::HedgeDelay).await {
            warn!("[Engine] Hedge-delay cancel failed on {}: {}", fill.slug, e);
        }
    }

    async fn cancel_market_orders(&self, market: &Market, reason: CancelReason) {
        self.cancel_leg(market, Leg::Up, reason).await;
        self.cancel_leg(market, Leg::Down, reason).await;
    }

    async fn cancel_leg(&self, market: &Market, leg: Leg, reason: CancelReason) {
        if let Err(e) = self.orders.cancel(market.token(leg), reason).await {
            warn!(
                "[Engine] Cancel failed on {} {} ({}): {}",
                market.slug, leg, reason, e
            );
        }
    }
}

/// Momentum-relaxed edge thresholds: a strong trend tolerates slightly
/// negative planned edge, bounded by small absolute floors.
fn edge_thresholds(cfg: &EngineConfig, signal: MomentumSignal) -> (f64, f64) {
    let mut entry = cfg.complete_set_min_edge;
    let mut cancel = cfg.complete_set_cancel_edge;
    if signal.is_strong() {
        entry = (entry - 0.01).max(-0.01);
        cancel = (cancel - 0.01).max(-0.02);
    }
    (entry, cancel)
}

/// The configured taker probability applies to 15-minute series as-is,
/// halves for hourly series, quarters for everything else.
fn series_taker_probability(probability: f64, series: SeriesKey) -> f64 {
    match series {
        SeriesKey::Btc15m | SeriesKey::Eth15m => probability,
        SeriesKey::Btc1h | SeriesKey::Eth1h => probability * 0.5,
        SeriesKey::Other => probability * 0.25,
    }
}
