//! Trade-tape source for the simulator.
//!
//! Pull-based: the simulator asks for recent prints on the tokens it holds
//! orders for and applies them oldest-first. Sources vary (WS last-trade with
//! synthetic size, book size-delta inference, a historical store); the
//! simulator only assumes this contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::Side;

/// One print on the public tape.
#[derive(Debug, Clone)]
pub struct TapePrint {
    pub ts: DateTime<Utc>,
    pub token_id: String,
    /// Aggressor side: a SELL print hits bids (and our resting buys).
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

#[async_trait]
pub trait TradeTape: Send + Sync {
    /// Recent prints for the token set, in any order; the caller sorts by
    /// timestamp ascending before applying.
    async fn recent_prints(
        &self,
        tokens: &[String],
        lookback_seconds: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<TapePrint>>;
}

/// In-memory tape for tests and replay: push prints, the simulator pulls.
#[derive(Default)]
pub struct VecTape {
    prints: Mutex<Vec<TapePrint>>,
}

impl VecTape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, print: TapePrint) {
        self.prints.lock().push(print);
    }
}

#[async_trait]
impl TradeTape for VecTape {
    async fn recent_prints(
        &self,
        tokens: &[String],
        _lookback_seconds: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<TapePrint>> {
        let prints = self.prints.lock();
        Ok(prints
            .iter()
            .filter(|p| tokens.iter().any(|t| t == &p.token_id))
            .take(limit)
            .cloned()
            .collect())
    }
}
