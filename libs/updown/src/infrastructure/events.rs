//! Outbound events.
//!
//! The engine publishes order-status transitions, (paper) trades, and a
//! discovery heartbeat to an external publisher. Emission is best-effort over
//! an unbounded channel - the core never blocks on a slow consumer - and
//! status events are suppressed unless something actually changed.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::Side;

/// How a simulated fill came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFillKind {
    Taker,
    Maker,
    MakerCross,
    MakerTape,
    MakerTapeFallback,
}

impl std::fmt::Display for SimFillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimFillKind::Taker => write!(f, "TAKER"),
            SimFillKind::Maker => write!(f, "MAKER"),
            SimFillKind::MakerCross => write!(f, "MAKER_CROSS"),
            SimFillKind::MakerTape => write!(f, "MAKER_TAPE"),
            SimFillKind::MakerTapeFallback => write!(f, "MAKER_TAPE_FALLBACK"),
        }
    }
}

/// One order-status transition.
#[derive(Debug, Clone)]
pub struct OrderStatusEvent {
    pub order_id: String,
    pub token_id: String,
    pub side: Side,
    pub requested_price: f64,
    pub requested_size: f64,
    pub status: String,
    pub matched: f64,
    pub remaining: f64,
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

/// A fill, synthetic in paper mode.
#[derive(Debug, Clone)]
pub struct UserTradeEvent {
    pub market: String,
    pub token_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub ts: DateTime<Utc>,
    pub sim_kind: Option<SimFillKind>,
}

/// Periodic heartbeat with the currently-active market set.
#[derive(Debug, Clone)]
pub struct DiscoveredMarketsEvent {
    pub slugs: Vec<String>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    OrderStatus(OrderStatusEvent),
    UserTrade(UserTradeEvent),
    DiscoveredMarkets(DiscoveredMarketsEvent),
}

/// Best-effort publisher. Cloneable; the receiving side belongs to the
/// external collaborator (or a logging drain in the paper binary).
#[derive(Clone)]
pub struct EventPublisher {
    tx: Sender<EngineEvent>,
}

impl EventPublisher {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// Never blocks; a closed receiver just drops the event.
    pub fn publish(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("[Events] Receiver gone, dropping event");
        }
    }
}

/// Suppression state: an order-status event is only emitted when status,
/// matched, or remaining differs from the last emission for that order.
/// Status comparison is case-insensitive and trimmed.
#[derive(Default)]
pub struct StatusDedup {
    last: HashMap<String, (String, i64, i64)>,
}

fn size_key(v: f64) -> i64 {
    (v * 100.0).round() as i64
}

impl StatusDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the event represents a strict change and records it.
    pub fn should_emit(&mut self, event: &OrderStatusEvent) -> bool {
        let status_norm = event.status.trim().to_uppercase();
        let key = (
            status_norm,
            size_key(event.matched),
            size_key(event.remaining),
        );

        let changed = self.last.get(&event.order_id) != Some(&key);
        if changed {
            self.last.insert(event.order_id.clone(), key);
        }
        changed
    }

    /// Drop an order's entry once it can emit no further events. Keeps the
    /// map bounded by the set of orders still in play.
    pub fn forget(&mut self, order_id: &str) {
        self.last.remove(order_id);
    }
}
