//! Order lifecycle manager.
//!
//! One live order per token, full stop. Replacing means cancel-then-place,
//! and the tri-state replace decision keeps churn down: tiny moves on a young
//! order are kept, anything younger than the replace floor is skipped, the
//! rest is replaced. Fills are reconciled by polling order state and handing
//! matched-size deltas to the caller; a fill that lands after a cancel still
//! reaches the ledger through the pending-fill list.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Order, OrderStatus, Side};
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::events::{
    EngineEvent, EventPublisher, OrderStatusEvent, StatusDedup,
};
use crate::infrastructure::exchange::{ExchangeAdapter, ExchangeError};

/// Outcome of asking whether an existing order should be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceDecision {
    /// New quote is close enough to the resting order; leave it.
    Keep,
    /// Order is too young to replace this tick.
    Skip,
    /// Cancel the resting order and place the new one.
    Replace,
}

/// Why a cancel was issued; carried into logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    BookStale,
    BookOutOfBand,
    InsufficientEdge,
    MarketExpired,
    OutOfWindow,
    HedgeDelay,
    NoQuote,
    Replace,
    Shutdown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelReason::BookStale => "BOOK_STALE",
            CancelReason::BookOutOfBand => "BOOK_OUT_OF_BAND",
            CancelReason::InsufficientEdge => "INSUFFICIENT_EDGE",
            CancelReason::MarketExpired => "MARKET_EXPIRED",
            CancelReason::OutOfWindow => "OUT_OF_WINDOW",
            CancelReason::HedgeDelay => "HEDGE_DELAY",
            CancelReason::NoQuote => "NO_QUOTE",
            CancelReason::Replace => "REPLACE",
            CancelReason::Shutdown => "SHUTDOWN",
        };
        write!(f, "{}", s)
    }
}

/// Canceled orders linger this long so a late fill still mutates inventory.
const PENDING_FILL_GRACE_MILLIS: i64 = 10_000;

pub struct OrderManager {
    adapter: Arc<dyn ExchangeAdapter>,
    clock: SharedClock,
    publisher: EventPublisher,
    /// token -> the one live order
    slots: RwLock<HashMap<String, Order>>,
    /// order_id -> canceled order still awaiting final fill state
    pending_fills: RwLock<HashMap<String, (Order, DateTime<Utc>)>>,
    dedup: Mutex<StatusDedup>,
}

impl OrderManager {
    pub fn new(
        adapter: Arc<dyn ExchangeAdapter>,
        clock: SharedClock,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            adapter,
            clock,
            publisher,
            slots: RwLock::new(HashMap::new()),
            pending_fills: RwLock::new(HashMap::new()),
            dedup: Mutex::new(StatusDedup::new()),
        }
    }

    pub fn live_order(&self, token: &str) -> Option<Order> {
        self.slots.read().get(token).cloned()
    }

    pub fn live_orders(&self) -> Vec<Order> {
        self.slots.read().values().cloned().collect()
    }

    /// Notional resting across all live orders; feeds the exposure cap.
    pub fn open_notional(&self) -> f64 {
        self.slots
            .read()
            .values()
            .map(|o| o.limit_price * o.remaining())
            .sum()
    }

    /// Place a new order for a token. The slot must be empty - any
    /// predecessor has to be canceled first.
    pub async fn place_order(
        &self,
        token: &str,
        side: Side,
        price: f64,
        size: f64,
        maker_at_placement: bool,
    ) -> Result<Option<Order>, ExchangeError> {
        if self.slots.read().contains_key(token) {
            warn!(
                "[Orders] Refusing to place on {}: slot already occupied",
                short(token)
            );
            return Ok(None);
        }

        let placed = match self.adapter.place_limit(token, side, price, size).await {
            Ok(placed) => placed,
            Err(e) => {
                if let ExchangeError::Rejected(ref reason) = e {
                    // Terminal: surface a rejected status event, slot stays free.
                    // No order id was assigned, so this bypasses dedup.
                    self.publisher.publish(EngineEvent::OrderStatus(OrderStatusEvent {
                        order_id: String::new(),
                        token_id: token.to_string(),
                        side,
                        requested_price: price,
                        requested_size: size,
                        status: OrderStatus::Rejected.to_string(),
                        matched: 0.0,
                        remaining: size,
                        error: Some(reason.clone()),
                        ts: self.clock.now(),
                    }));
                    info!("[Orders] Placement rejected on {}: {}", short(token), reason);
                }
                return Err(e);
            }
        };

        let order = Order {
            order_id: placed.order_id,
            token_id: token.to_string(),
            side,
            limit_price: price,
            requested_size: size,
            matched: placed.matched,
            status: placed.status,
            created_at: self.clock.now(),
            maker_at_placement,
        };

        self.emit_for(&order, None);

        if order.status.is_live() {
            self.slots
                .write()
                .insert(token.to_string(), order.clone());
        } else if order.matched > 0.0 {
            // Filled on arrival (taker): route the fill through the pending
            // list so the next poll reconciles it.
            self.pending_fills.write().insert(
                order.order_id.clone(),
                (
                    Order {
                        matched: 0.0,
                        status: OrderStatus::Open,
                        ..order.clone()
                    },
                    self.clock.now(),
                ),
            );
        }

        debug!(
            "[Orders] Placed {} {} {:.2} @ {:.3} ({})",
            side,
            short(token),
            size,
            price,
            order.status
        );
        Ok(Some(order))
    }

    /// Decide whether a new quote warrants replacing the resting order.
    /// Returns `Replace` when no order is resting (nothing to keep).
    pub fn replace_decision(
        &self,
        token: &str,
        new_price: f64,
        new_size: f64,
        cfg: &EngineConfig,
    ) -> ReplaceDecision {
        let Some(existing) = self.live_order(token) else {
            return ReplaceDecision::Replace;
        };

        let now = self.clock.now();
        let age_millis = existing.age_millis(now);
        let price_close = (new_price - existing.limit_price).abs() < cfg.min_price_delta;
        let size_close = (new_size - existing.requested_size).abs() < cfg.min_size_delta;

        if price_close && size_close && age_millis < cfg.force_replace_millis as i64 {
            return ReplaceDecision::Keep;
        }
        if age_millis < cfg.min_replace_millis as i64 {
            return ReplaceDecision::Skip;
        }
        ReplaceDecision::Replace
    }

    /// Cancel the live order for a token, freeing the slot immediately. The
    /// canceled order moves to the pending-fill list so a late fill still
    /// reaches inventory.
    pub async fn cancel(
        &self,
        token: &str,
        reason: CancelReason,
    ) -> Result<bool, ExchangeError> {
        let Some(order) = self.slots.write().remove(token) else {
            return Ok(false);
        };

        debug!(
            "[Orders] Cancelling {} on {} ({})",
            short(&order.order_id),
            short(token),
            reason
        );

        // Park the order first: even if the cancel call fails, the poll loop
        // keeps tracking it for fills until it goes terminal.
        self.pending_fills
            .write()
            .insert(order.order_id.clone(), (order.clone(), self.clock.now()));

        let confirmed = self.adapter.cancel(&order.order_id).await?;

        let mut canceled = order;
        canceled.status = OrderStatus::Canceled;
        self.emit_for(&canceled, None);

        Ok(confirmed)
    }

    pub async fn cancel_all(&self, reason: CancelReason) {
        let tokens: Vec<String> = self.slots.read().keys().cloned().collect();
        for token in tokens {
            if let Err(e) = self.cancel(&token, reason).await {
                warn!("[Orders] Cancel failed on {}: {}", short(&token), e);
            }
        }
    }

    /// Poll every live order plus recently-canceled ones. Matched-size
    /// increases invoke `on_fill(order, delta)`; terminal statuses free the
    /// slot. Inputs are gathered under the lock, I/O runs without it, and
    /// results are re-applied against current state.
    pub async fn check_pending_orders<F>(&self, mut on_fill: F)
    where
        F: FnMut(&Order, f64),
    {
        let live: Vec<Order> = self.slots.read().values().cloned().collect();
        let zombies: Vec<Order> = self
            .pending_fills
            .read()
            .values()
            .map(|(o, _)| o.clone())
            .collect();

        for order in live {
            let query = match self.adapter.get_order(&order.order_id).await {
                Ok(q) => q,
                Err(e) if e.is_transient() => continue,
                Err(e) => {
                    warn!(
                        "[Orders] Poll failed for {}: {}",
                        short(&order.order_id),
                        e
                    );
                    continue;
                }
            };

            let delta = query.matched - order.matched;
            let mut updated = order.clone();
            if delta > 1e-9 {
                updated.apply_match(delta);
            }
            updated.status = if query.status.is_terminal() {
                query.status
            } else {
                updated.status.max_progress(query.status)
            };

            if delta > 1e-9 {
                on_fill(&updated, delta);
            }

            // Re-apply under the lock, only if the slot still holds this order
            let mut slots = self.slots.write();
            match slots.get_mut(&order.token_id) {
                Some(current) if current.order_id == order.order_id => {
                    *current = updated.clone();
                    if updated.status.is_terminal() {
                        slots.remove(&order.token_id);
                    }
                }
                _ => {} // replaced or canceled mid-poll; late fills go via pending list
            }
            drop(slots);

            self.emit_for(&updated, None);
            if updated.status.is_terminal() {
                self.dedup.lock().forget(&updated.order_id);
            }
        }

        // Late fills on canceled orders
        let now = self.clock.now();
        for order in zombies {
            let query = match self.adapter.get_order(&order.order_id).await {
                Ok(q) => q,
                Err(_) => {
                    self.expire_pending(&order.order_id, now);
                    continue;
                }
            };

            let delta = query.matched - order.matched;
            if delta > 1e-9 {
                let mut updated = order.clone();
                updated.apply_match(delta);
                info!(
                    "[Orders] Late fill on canceled {}: {:.2} shares",
                    short(&order.order_id),
                    delta
                );
                on_fill(&updated, delta);
                if let Some((entry, _)) = self.pending_fills.write().get_mut(&order.order_id) {
                    entry.matched = query.matched;
                }
            }

            if query.status.is_terminal() {
                self.pending_fills.write().remove(&order.order_id);
                self.dedup.lock().forget(&order.order_id);
            } else {
                self.expire_pending(&order.order_id, now);
            }
        }
    }

    fn expire_pending(&self, order_id: &str, now: DateTime<Utc>) {
        let mut pending = self.pending_fills.write();
        if let Some((_, since)) = pending.get(order_id) {
            if (now - *since).num_milliseconds() > PENDING_FILL_GRACE_MILLIS {
                pending.remove(order_id);
                self.dedup.lock().forget(order_id);
            }
        }
    }

    fn emit_for(&self, order: &Order, error: Option<String>) {
        self.emit(&OrderStatusEvent {
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
        });
    }

    fn emit(&self, event: &OrderStatusEvent) {
        if self.dedup.lock().should_emit(event) {
            self.publisher
                .publish(EngineEvent::OrderStatus(event.clone()));
        }
    }
}

trait StatusProgress {
    fn max_progress(self, other: OrderStatus) -> OrderStatus;
}

impl StatusProgress for OrderStatus {
    /// Never regress PARTIAL back to OPEN on a racy read.
    fn max_progress(self, other: OrderStatus) -> OrderStatus {
        match (self, other) {
            (OrderStatus::Partial, OrderStatus::Open) => OrderStatus::Partial,
            _ => other,
        }
    }
}

fn short(id: &str) -> &str {
    &id[..12.min(id.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::exchange::{
        Bankroll, ExecutionMode, OrderQuery, PlacedOrder, Position,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Scriptable adapter: orders accumulate matched size when the test says so.
    struct ScriptedExchange {
        orders: Mutex<HashMap<String, (OrderStatus, f64, f64)>>, // id -> (status, matched, size)
        next_id: Mutex<u64>,
        reject_next: Mutex<bool>,
    }

    impl ScriptedExchange {
        fn new() -> Self {
            Self {
                orders: Mutex::new(HashMap::new()),
                next_id: Mutex::new(0),
                reject_next: Mutex::new(false),
            }
        }

        fn fill(&self, order_id: &str, delta: f64) {
            let mut orders = self.orders.lock();
            if let Some((status, matched, size)) = orders.get_mut(order_id) {
                *matched = (*matched + delta).min(*size);
                *status = if (*size - *matched).abs() < 1e-9 {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Partial
                };
            }
        }
    }

    #[async_trait]
    impl ExchangeAdapter for ScriptedExchange {
        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Paper
        }

        async fn place_limit(
            &self,
            _token: &str,
            _side: Side,
            _price: f64,
            size: f64,
        ) -> Result<PlacedOrder, ExchangeError> {
            if *self.reject_next.lock() {
                *self.reject_next.lock() = false;
                return Err(ExchangeError::Rejected("insufficient balance".to_string()));
            }
            let mut next = self.next_id.lock();
            *next += 1;
            let id = format!("ord-{}", *next);
            self.orders
                .lock()
                .insert(id.clone(), (OrderStatus::Open, 0.0, size));
            Ok(PlacedOrder {
                order_id: id,
                status: OrderStatus::Open,
                matched: 0.0,
                remaining: size,
                mode: ExecutionMode::Paper,
                raw: None,
            })
        }

        async fn cancel(&self, order_id: &str) -> Result<bool, ExchangeError> {
            let mut orders = self.orders.lock();
            match orders.get_mut(order_id) {
                Some((status, _, _)) if !status.is_terminal() => {
                    *status = OrderStatus::Canceled;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn get_order(&self, order_id: &str) -> Result<OrderQuery, ExchangeError> {
            let orders = self.orders.lock();
            let (status, matched, size) = orders
                .get(order_id)
                .copied()
                .ok_or_else(|| ExchangeError::Rejected("unknown order".to_string()))?;
            Ok(OrderQuery {
                status,
                matched,
                remaining: size - matched,
            })
        }

        async fn tick_size(&self, _token: &str) -> Result<f64, ExchangeError> {
            Ok(0.01)
        }

        async fn bankroll(&self) -> Result<Bankroll, ExchangeError> {
            Ok(Bankroll {
                usdc: 1000.0,
                equity: 1000.0,
            })
        }

        async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
            Ok(vec![])
        }
    }

    fn setup() -> (Arc<ManualClock>, Arc<ScriptedExchange>, OrderManager) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let exchange = Arc::new(ScriptedExchange::new());
        let (publisher, _rx) = EventPublisher::new();
        let manager = OrderManager::new(exchange.clone(), clock.clone(), publisher);
        (clock, exchange, manager)
    }

    #[tokio::test]
    async fn test_single_order_per_token() {
        let (_clock, _exchange, manager) = setup();
        let first = manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        assert!(first.is_some());

        // Second placement on the same token is refused until a cancel
        let second = manager
            .place_order("tok", Side::Buy, 0.49, 10.0, true)
            .await
            .unwrap();
        assert!(second.is_none());

        manager.cancel("tok", CancelReason::Replace).await.unwrap();
        let third = manager
            .place_order("tok", Side::Buy, 0.49, 10.0, true)
            .await
            .unwrap();
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn test_replace_decision_keep_skip_replace() {
        let (clock, _exchange, manager) = setup();
        let cfg = EngineConfig {
            min_price_delta: 0.005,
            min_size_delta: 0.5,
            min_replace_millis: 1_000,
            force_replace_millis: 10_000,
            ..Default::default()
        };

        manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        clock.advance_millis(2_000);

        // Tiny move on a 2s-old order: keep
        assert_eq!(
            manager.replace_decision("tok", 0.482, 10.4, &cfg),
            ReplaceDecision::Keep
        );
        // Real move on the same order: replace
        assert_eq!(
            manager.replace_decision("tok", 0.49, 10.0, &cfg),
            ReplaceDecision::Replace
        );

        // Fresh order: big move but too young
        manager.cancel("tok", CancelReason::Replace).await.unwrap();
        manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        clock.advance_millis(500);
        assert_eq!(
            manager.replace_decision("tok", 0.49, 10.0, &cfg),
            ReplaceDecision::Skip
        );
    }

    #[tokio::test]
    async fn test_force_replace_after_age() {
        let (clock, _exchange, manager) = setup();
        let cfg = EngineConfig {
            force_replace_millis: 10_000,
            ..Default::default()
        };
        manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        clock.advance_millis(10_001);
        // Unchanged quote, but past the force-replace age
        assert_eq!(
            manager.replace_decision("tok", 0.48, 10.0, &cfg),
            ReplaceDecision::Replace
        );
    }

    #[tokio::test]
    async fn test_fill_delta_reaches_callback() {
        let (_clock, exchange, manager) = setup();
        let placed = manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap()
            .unwrap();

        exchange.fill(&placed.order_id, 4.0);

        let mut fills = Vec::new();
        manager
            .check_pending_orders(|order, delta| fills.push((order.order_id.clone(), delta)))
            .await;
        assert_eq!(fills.len(), 1);
        assert!((fills[0].1 - 4.0).abs() < 1e-9);

        // Second poll with no new fills: no callback
        fills.clear();
        manager.check_pending_orders(|_, d| fills.push(("".to_string(), d))).await;
        assert!(fills.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_fill_frees_slot() {
        let (_clock, exchange, manager) = setup();
        let placed = manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap()
            .unwrap();
        exchange.fill(&placed.order_id, 10.0);

        manager.check_pending_orders(|_, _| {}).await;
        assert!(manager.live_order("tok").is_none());
    }

    #[tokio::test]
    async fn test_late_fill_after_cancel_reaches_inventory() {
        let (_clock, exchange, manager) = setup();
        let placed = manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap()
            .unwrap();

        manager.cancel("tok", CancelReason::BookStale).await.unwrap();
        assert!(manager.live_order("tok").is_none());

        // Fill lands after the cancel
        exchange.fill(&placed.order_id, 5.0);

        let mut fills = Vec::new();
        manager
            .check_pending_orders(|order, delta| fills.push((order.token_id.clone(), delta)))
            .await;
        assert_eq!(fills, vec![("tok".to_string(), 5.0)]);
    }

    #[tokio::test]
    async fn test_cancel_idempotent() {
        let (_clock, _exchange, manager) = setup();
        manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        assert!(manager.cancel("tok", CancelReason::Shutdown).await.unwrap());
        // Second cancel: no slot, no-op success
        assert!(!manager.cancel("tok", CancelReason::Shutdown).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_placement_leaves_slot_free() {
        let (_clock, exchange, manager) = setup();
        *exchange.reject_next.lock() = true;
        let result = manager.place_order("tok", Side::Buy, 0.48, 10.0, true).await;
        assert!(matches!(result, Err(ExchangeError::Rejected(_))));
        assert!(manager.live_order("tok").is_none());

        // Slot usable immediately afterwards
        let placed = manager
            .place_order("tok", Side::Buy, 0.48, 10.0, true)
            .await
            .unwrap();
        assert!(placed.is_some());
    }

    #[tokio::test]
    async fn test_open_notional() {
        let (_clock, _exchange, manager) = setup();
        manager
            .place_order("a", Side::Buy, 0.50, 10.0, true)
            .await
            .unwrap();
        manager
            .place_order("b", Side::Buy, 0.40, 20.0, true)
            .await
            .unwrap();
        assert!((manager.open_notional() - 13.0).abs() < 1e-9);
    }
}
