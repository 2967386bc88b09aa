//! Quote calculation.
//!
//! Given config, book, and inventory, produce the tick-quantized entry price
//! and the capped order size for one leg. Prices never cross the opposite
//! top-of-book; sizes run through the full cap chain and come out quantized
//! to 2 decimals or not at all.

use crate::domain::price::{ceil_to_tick, floor_to_tick, quantize_size_down, PRICE_EPSILON};
use crate::domain::TopOfBook;
use crate::infrastructure::config::EngineConfig;

/// Smallest placeable size in shares.
pub const MIN_ORDER_SIZE: f64 = 0.01;

/// Maker BUY entry price: best bid plus signed skew and improvement ticks,
/// floored to the tick, capped strictly below the ask. `None` when the book
/// can't support a quote.
pub fn entry_price_buy(
    book: &TopOfBook,
    tick: f64,
    skew_ticks: i32,
    improve_ticks: u32,
) -> Option<f64> {
    let bid = book.bid_price()?;
    let ask = book.ask_price()?;

    let raw = bid + (skew_ticks as f64 + improve_ticks as f64) * tick;
    let mut price = floor_to_tick(raw, tick);

    // Never cross: strictly below the ask
    let max_price = floor_to_tick(ask - tick, tick);
    if price > max_price {
        price = max_price;
    }
    if price < tick - PRICE_EPSILON {
        return None;
    }
    Some(price)
}

/// Maker SELL entry price, symmetric: skew pulls down from the ask, price is
/// ceiled to the tick and stays strictly above the bid.
pub fn entry_price_sell(
    book: &TopOfBook,
    tick: f64,
    skew_ticks: i32,
    improve_ticks: u32,
) -> Option<f64> {
    let bid = book.bid_price()?;
    let ask = book.ask_price()?;

    let raw = ask - (skew_ticks as f64 + improve_ticks as f64) * tick;
    let mut price = ceil_to_tick(raw, tick);

    let min_price = ceil_to_tick(bid + tick, tick);
    if price < min_price {
        price = min_price;
    }
    if price > 1.0 - tick + PRICE_EPSILON {
        return None;
    }
    Some(price)
}

/// Taker BUY price: lift the ask, rounded up to the tick.
pub fn taker_price_buy(book: &TopOfBook, tick: f64) -> Option<f64> {
    let ask = book.ask_price()?;
    let price = ceil_to_tick(ask, tick);
    if price >= 1.0 {
        None
    } else {
        Some(price)
    }
}

/// Everything the sizing pipeline needs besides the config.
#[derive(Debug, Clone, Copy)]
pub struct SizeContext {
    pub price: f64,
    pub bankroll: f64,
    pub dynamic_multiplier: f64,
    pub size_skew_factor: f64,
    /// Live-order notional plus inventory cost basis.
    pub current_exposure: f64,
}

/// Order size in shares after the cap chain, or `None` for no-quote.
pub fn order_size(cfg: &EngineConfig, ctx: &SizeContext) -> Option<f64> {
    if ctx.price <= 0.0 {
        return None;
    }

    let base = cfg.quote_size * ctx.dynamic_multiplier * ctx.size_skew_factor;
    cap_size(cfg, ctx, base)
}

/// Cap an arbitrary base share count (also used by the top-up paths, which
/// size from the imbalance instead of `quote_size`).
pub fn cap_size(cfg: &EngineConfig, ctx: &SizeContext, base_shares: f64) -> Option<f64> {
    if ctx.price <= 0.0 || base_shares <= 0.0 {
        return None;
    }
    let mut size = base_shares;

    // Per-order notional and bankroll-fraction caps
    size = size.min((cfg.risk.max_order_notional_usd / ctx.price).floor());
    size = size.min((cfg.risk.max_order_bankroll_fraction * ctx.bankroll / ctx.price).floor());

    // Remaining global exposure, denominated in shares at this price
    let exposure_room =
        cfg.risk.max_total_bankroll_fraction * ctx.bankroll - ctx.current_exposure;
    if exposure_room <= 0.0 {
        return None;
    }
    size = size.min(exposure_room / ctx.price);

    // Hard risk caps
    size = size.min(cfg.risk.max_order_size);

    let size = quantize_size_down(size);
    if size < MIN_ORDER_SIZE {
        None
    } else {
        Some(size)
    }
}

/// Per-leg inventory skew in ticks: |imbalance| capped at the configured
/// share cap, mapped linearly onto [0, max_ticks]. The heavy leg gets the
/// negative sign (pull back), the light leg the positive one (lean in).
pub fn skew_ticks(imbalance: f64, cfg: &EngineConfig) -> (i32, i32) {
    let cap = cfg.complete_set_max_skew_shares;
    let max_ticks = cfg.complete_set_max_skew_ticks as f64;
    if cap <= 0.0 || max_ticks <= 0.0 || imbalance.abs() < 1e-9 {
        return (0, 0);
    }

    let magnitude = ((imbalance.abs().min(cap) / cap) * max_ticks).round() as i32;
    if imbalance > 0.0 {
        // UP-heavy: discourage UP, favor DOWN
        (-magnitude, magnitude)
    } else {
        (magnitude, -magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookLevel;
    use chrono::{TimeZone, Utc};

    fn book(bid: f64, ask: f64) -> TopOfBook {
        TopOfBook {
            bid: Some(BookLevel::new(bid, 100.0)),
            ask: Some(BookLevel::new(ask, 100.0)),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            last_trade: None,
        }
    }

    fn ctx(price: f64) -> SizeContext {
        SizeContext {
            price,
            bankroll: 1000.0,
            dynamic_multiplier: 1.0,
            size_skew_factor: 1.0,
            current_exposure: 0.0,
        }
    }

    #[test]
    fn test_entry_price_buy_at_bid() {
        let b = book(0.48, 0.50);
        assert_eq!(entry_price_buy(&b, 0.01, 0, 0), Some(0.48));
    }

    #[test]
    fn test_entry_price_buy_improved_never_crosses() {
        let b = book(0.48, 0.50);
        // One tick improvement lands at 0.49
        assert_eq!(entry_price_buy(&b, 0.01, 0, 1), Some(0.49));
        // Three ticks would cross; capped at ask - tick
        assert_eq!(entry_price_buy(&b, 0.01, 0, 3), Some(0.49));
    }

    #[test]
    fn test_entry_price_buy_negative_skew() {
        let b = book(0.48, 0.50);
        assert_eq!(entry_price_buy(&b, 0.01, -2, 0), Some(0.46));
    }

    #[test]
    fn test_entry_price_buy_floor_at_one_tick() {
        let b = book(0.01, 0.03);
        // Skew would push below one tick: no quote
        assert_eq!(entry_price_buy(&b, 0.01, -3, 0), None);
    }

    #[test]
    fn test_entry_price_one_sided_book() {
        let mut b = book(0.48, 0.50);
        b.ask = None;
        assert_eq!(entry_price_buy(&b, 0.01, 0, 0), None);
    }

    #[test]
    fn test_entry_price_sell_symmetric() {
        let b = book(0.48, 0.50);
        assert_eq!(entry_price_sell(&b, 0.01, 0, 0), Some(0.50));
        assert_eq!(entry_price_sell(&b, 0.01, 0, 1), Some(0.49));
        // Can't go to or below the bid
        assert_eq!(entry_price_sell(&b, 0.01, 0, 5), Some(0.49));
    }

    #[test]
    fn test_taker_price_lifts_ask() {
        let b = book(0.48, 0.503);
        assert_eq!(taker_price_buy(&b, 0.01), Some(0.51));
        assert_eq!(taker_price_buy(&b, 0.001), Some(0.503));
    }

    #[test]
    fn test_order_size_base() {
        let cfg = EngineConfig::default(); // quote_size 20
        assert_eq!(order_size(&cfg, &ctx(0.48)), Some(20.0));
    }

    #[test]
    fn test_order_size_notional_cap() {
        let mut cfg = EngineConfig::default();
        cfg.quote_size = 1000.0;
        cfg.risk.max_order_notional_usd = 50.0;
        cfg.risk.max_order_size = 10_000.0;
        // floor(50/0.5) = 100, but bankroll fraction caps first:
        // 0.10 * 1000 / 0.5 = 200 -> notional cap 100 wins
        assert_eq!(order_size(&cfg, &ctx(0.50)), Some(100.0));
    }

    #[test]
    fn test_order_size_exposure_reduces() {
        let mut cfg = EngineConfig::default();
        cfg.quote_size = 100.0;
        cfg.risk.max_total_bankroll_fraction = 0.10; // $100 budget
        let mut c = ctx(0.50);
        c.current_exposure = 95.0; // $5 room -> 10 shares at 0.50
        assert_eq!(order_size(&cfg, &c), Some(10.0));

        c.current_exposure = 100.0;
        assert_eq!(order_size(&cfg, &c), None);
    }

    #[test]
    fn test_order_size_no_quote_below_min() {
        let mut cfg = EngineConfig::default();
        cfg.quote_size = 0.005;
        assert_eq!(order_size(&cfg, &ctx(0.50)), None);
    }

    #[test]
    fn test_skew_ticks_signs() {
        let cfg = EngineConfig {
            complete_set_max_skew_ticks: 3,
            complete_set_max_skew_shares: 50.0,
            ..Default::default()
        };

        // UP-heavy: pull UP back, lean into DOWN
        let (up, down) = skew_ticks(50.0, &cfg);
        assert_eq!((up, down), (-3, 3));

        // Half the cap maps to half the ticks (rounded)
        let (up, down) = skew_ticks(-25.0, &cfg);
        assert_eq!((up, down), (2, -2));

        assert_eq!(skew_ticks(0.0, &cfg), (0, 0));
    }

    #[test]
    fn test_skew_ticks_capped() {
        let cfg = EngineConfig {
            complete_set_max_skew_ticks: 3,
            complete_set_max_skew_shares: 50.0,
            ..Default::default()
        };
        // Far past the share cap still yields max ticks
        let (up, down) = skew_ticks(500.0, &cfg);
        assert_eq!((up, down), (-3, 3));
    }
}
