//! Exchange adapter contract.
//!
//! The live transport lives outside this crate; the engine talks to anything
//! implementing `ExchangeAdapter`. The paper simulator implements the same
//! contract, so the quoting path cannot tell the difference.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{OrderStatus, Side};
use crate::infrastructure::clock::SharedClock;

/// Whether results came from the live exchange or the paper simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Live,
    Paper,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "LIVE"),
            ExecutionMode::Paper => write!(f, "PAPER"),
        }
    }
}

/// Typed failure surface. `Rejected` is terminal for the order; `Transient`
/// is retried inside the adapter boundary.
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("transient exchange failure: {0}")]
    Transient(String),

    #[error("invalid price {0}")]
    InvalidPrice(f64),

    #[error("invalid size {0}")]
    InvalidSize(f64),

    #[error("authentication failure")]
    AuthFailure,

    #[error("exchange unavailable")]
    Unavailable,
}

impl ExchangeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExchangeError::Transient(_) | ExchangeError::Unavailable)
    }
}

/// Result of a placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub status: OrderStatus,
    pub matched: f64,
    pub remaining: f64,
    pub mode: ExecutionMode,
    /// Raw response payload from the venue, when one exists.
    pub raw: Option<serde_json::Value>,
}

/// Result of an order query.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub status: OrderStatus,
    pub matched: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bankroll {
    pub usdc: f64,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub token_id: String,
    pub shares: f64,
    pub avg_price: f64,
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn place_limit(
        &self,
        token_id: &str,
        side: Side,
        price: f64,
        size: f64,
    ) -> Result<PlacedOrder, ExchangeError>;

    /// Cancel by id. Unknown or already-terminal orders succeed with `false`.
    async fn cancel(&self, order_id: &str) -> Result<bool, ExchangeError>;

    async fn get_order(&self, order_id: &str) -> Result<OrderQuery, ExchangeError>;

    async fn tick_size(&self, token_id: &str) -> Result<f64, ExchangeError>;

    async fn bankroll(&self) -> Result<Bankroll, ExchangeError>;

    async fn positions(&self) -> Result<Vec<Position>, ExchangeError>;
}

/// Retry a transient-failing adapter call with bounded backoff.
/// `Rejected`/`InvalidPrice`/`InvalidSize`/`AuthFailure` pass straight through.
pub async fn with_retries<T, F, Fut>(attempts: u32, mut call: F) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ExchangeError>>,
{
    let mut backoff_ms = 100u64;
    let mut last_err = ExchangeError::Unavailable;
    for attempt in 0..attempts.max(1) {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() => {
                debug!("transient exchange error (attempt {}): {}", attempt + 1, e);
                last_err = e;
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(2_000);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err)
}

/// Tick sizes change rarely; cache lookups for 10 minutes per token.
pub struct TickSizeCache {
    adapter: Arc<dyn ExchangeAdapter>,
    clock: SharedClock,
    cache: RwLock<HashMap<String, (f64, DateTime<Utc>)>>,
}

const TICK_SIZE_TTL_MILLIS: i64 = 600_000;

impl TickSizeCache {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, clock: SharedClock) -> Self {
        Self {
            adapter,
            clock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, token_id: &str) -> Result<f64, ExchangeError> {
        let now = self.clock.now();
        if let Some((tick, fetched_at)) = self.cache.read().get(token_id).copied() {
            if (now - fetched_at).num_milliseconds() < TICK_SIZE_TTL_MILLIS {
                return Ok(tick);
            }
        }

        match self.adapter.tick_size(token_id).await {
            Ok(tick) => {
                self.cache
                    .write()
                    .insert(token_id.to_string(), (tick, now));
                Ok(tick)
            }
            Err(e) => {
                // Serve a stale entry over failing the tick
                if let Some((tick, _)) = self.cache.read().get(token_id).copied() {
                    warn!("tick size refresh failed for {}, using cached: {}", token_id, e);
                    return Ok(tick);
                }
                Err(e)
            }
        }
    }

    pub fn evict(&self, token_id: &str) {
        self.cache.write().remove(token_id);
    }
}
