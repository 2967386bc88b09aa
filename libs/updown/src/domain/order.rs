//! Order state as tracked by the order manager and the simulator.

use chrono::{DateTime, Utc};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SELL" => Side::Sell,
            _ => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Parse a status string case-insensitively, trimming whitespace.
    /// Unknown strings map to `Open` rather than failing the stream.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PARTIAL" | "PARTIALLY_FILLED" => OrderStatus::Partial,
            "FILLED" | "MATCHED" => OrderStatus::Filled,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            _ => OrderStatus::Open,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }

    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Partial => write!(f, "PARTIAL"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A single order. `matched + remaining() == requested_size` holds through
/// every transition because `remaining` is derived, never stored.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub token_id: String,
    pub side: Side,
    pub limit_price: f64,
    pub requested_size: f64,
    pub matched: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// True iff the limit price was strictly better than the opposite
    /// top-of-book at placement (BUY < best ask, SELL > best bid).
    pub maker_at_placement: bool,
}

impl Order {
    pub fn remaining(&self) -> f64 {
        (self.requested_size - self.matched).max(0.0)
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_milliseconds()
    }

    /// Apply a matched-size increase, moving status to PARTIAL or FILLED.
    pub fn apply_match(&mut self, delta: f64) {
        self.matched = (self.matched + delta).min(self.requested_size);
        if self.remaining() < 1e-9 {
            self.status = OrderStatus::Filled;
        } else if self.matched > 0.0 {
            self.status = OrderStatus::Partial;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn order() -> Order {
        Order {
            order_id: "o1".to_string(),
            token_id: "tok".to_string(),
            side: Side::Buy,
            limit_price: 0.48,
            requested_size: 10.0,
            matched: 0.0,
            status: OrderStatus::Open,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            maker_at_placement: true,
        }
    }

    #[test]
    fn test_matched_plus_remaining_invariant() {
        let mut o = order();
        for delta in [2.5, 3.5, 4.0] {
            o.apply_match(delta);
            assert!((o.matched + o.remaining() - o.requested_size).abs() < 1e-9);
        }
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn test_partial_then_filled() {
        let mut o = order();
        o.apply_match(4.0);
        assert_eq!(o.status, OrderStatus::Partial);
        assert!(o.is_live());
        o.apply_match(6.0);
        assert_eq!(o.status, OrderStatus::Filled);
        assert!(!o.is_live());
    }

    #[test]
    fn test_status_parsing_case_insensitive() {
        assert_eq!(OrderStatus::from_str(" filled "), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_str("CANCELLED"), OrderStatus::Canceled);
        assert_eq!(OrderStatus::from_str("partially_filled"), OrderStatus::Partial);
        assert_eq!(OrderStatus::from_str("live-ish"), OrderStatus::Open);
    }

    #[test]
    fn test_overfill_clamped() {
        let mut o = order();
        o.apply_match(12.0);
        assert_eq!(o.matched, 10.0);
        assert_eq!(o.remaining(), 0.0);
    }
}
