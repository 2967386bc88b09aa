//! Taker-leg selection and top-up gating.

use chrono::{DateTime, Utc};

use crate::domain::{Leg, TopOfBook};
use crate::infrastructure::config::FastTopUpConfig;
use crate::infrastructure::inventory::MarketInventory;

/// Edge of taking one leg at its ask while the other rests at its bid.
#[derive(Debug, Clone, Copy)]
pub struct TakerEdges {
    pub take_up: f64,
    pub take_down: f64,
}

pub fn taker_edges(up: &TopOfBook, down: &TopOfBook) -> Option<TakerEdges> {
    let (bid_up, ask_up) = (up.bid_price()?, up.ask_price()?);
    let (bid_down, ask_down) = (down.bid_price()?, down.ask_price()?);
    Some(TakerEdges {
        take_up: 1.0 - (ask_up + bid_down),
        take_down: 1.0 - (bid_up + ask_down),
    })
}

/// Pick the taker leg. Negative-edge legs never qualify. When both qualify
/// and the size factors clearly diverge, the heavier factor wins; otherwise
/// the larger edge does, with the imbalance sign breaking exact ties toward
/// the rebalancing leg.
pub fn choose_taker_leg(
    edges: TakerEdges,
    size_factor_up: f64,
    size_factor_down: f64,
    imbalance: f64,
) -> Option<Leg> {
    let up_ok = edges.take_up >= 0.0;
    let down_ok = edges.take_down >= 0.0;

    match (up_ok, down_ok) {
        (false, false) => None,
        (true, false) => Some(Leg::Up),
        (false, true) => Some(Leg::Down),
        (true, true) => {
            if (size_factor_up - size_factor_down).abs() >= 0.05 {
                return Some(if size_factor_up > size_factor_down {
                    Leg::Up
                } else {
                    Leg::Down
                });
            }
            if (edges.take_up - edges.take_down).abs() > 1e-9 {
                return Some(if edges.take_up > edges.take_down {
                    Leg::Up
                } else {
                    Leg::Down
                });
            }
            // Tie: rebalance. UP-heavy means buy DOWN.
            if imbalance > 0.0 {
                Some(Leg::Down)
            } else {
                Some(Leg::Up)
            }
        }
    }
}

/// Why a fast top-up did not fire; surfaced in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopUpHold {
    Balanced,
    Cooldown,
    OutsideFillWindow,
    LaggingFilledAfterLeader,
    SpreadTooWide,
    EdgeTooThin,
    NoBook,
}

/// Evaluate the fast top-up gate. Returns the lagging leg to take when every
/// condition passes.
pub fn fast_top_up_check(
    cfg: &FastTopUpConfig,
    inventory: &MarketInventory,
    lagging_book: &TopOfBook,
    now: DateTime<Utc>,
) -> Result<Leg, TopUpHold> {
    let imbalance = inventory.imbalance();
    if imbalance.abs() < cfg.min_shares {
        return Err(TopUpHold::Balanced);
    }
    let leading = inventory.heavy_leg().ok_or(TopUpHold::Balanced)?;
    let lagging = leading.opposite();

    if let Some(last_top_up) = inventory.last_top_up_at {
        if (now - last_top_up).num_milliseconds() < cfg.cooldown_millis as i64 {
            return Err(TopUpHold::Cooldown);
        }
    }

    let lead_pos = inventory.leg(leading);
    let Some(lead_fill_at) = lead_pos.last_fill_at else {
        return Err(TopUpHold::OutsideFillWindow);
    };
    let since_fill = (now - lead_fill_at).num_seconds();
    if since_fill < cfg.min_seconds_after_fill as i64
        || since_fill > cfg.max_seconds_after_fill as i64
    {
        return Err(TopUpHold::OutsideFillWindow);
    }

    // The lagging leg must not have filled after the leader
    if let Some(lag_fill_at) = inventory.leg(lagging).last_fill_at {
        if lag_fill_at > lead_fill_at {
            return Err(TopUpHold::LaggingFilledAfterLeader);
        }
    }

    let spread = lagging_book.spread().ok_or(TopUpHold::NoBook)?;
    if spread > cfg.taker_max_spread {
        return Err(TopUpHold::SpreadTooWide);
    }

    let lead_price = lead_pos.last_fill_price.ok_or(TopUpHold::OutsideFillWindow)?;
    let lag_ask = lagging_book.ask_price().ok_or(TopUpHold::NoBook)?;
    let hedge_edge = 1.0 - (lead_price + lag_ask);
    if hedge_edge < cfg.min_edge {
        return Err(TopUpHold::EdgeTooThin);
    }

    Ok(lagging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookLevel;
    use crate::infrastructure::inventory::LegPosition;
    use chrono::{Duration, TimeZone};

    fn book(bid: f64, ask: f64) -> TopOfBook {
        TopOfBook {
            bid: Some(BookLevel::new(bid, 100.0)),
            ask: Some(BookLevel::new(ask, 100.0)),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            last_trade: None,
        }
    }

    fn cfg() -> FastTopUpConfig {
        FastTopUpConfig {
            enabled: true,
            min_shares: 5.0,
            fraction: 0.6,
            min_edge: 0.0,
            cooldown_millis: 10_000,
            min_seconds_after_fill: 1,
            max_seconds_after_fill: 30,
            probability: 0.5,
            taker_max_spread: 0.03,
        }
    }

    fn up_heavy_inventory(fill_at: DateTime<Utc>, fill_price: f64) -> MarketInventory {
        MarketInventory {
            up: LegPosition {
                shares: 10.0,
                cost: 10.0 * fill_price,
                last_fill_at: Some(fill_at),
                last_fill_price: Some(fill_price),
            },
            down: LegPosition::default(),
            last_top_up_at: None,
        }
    }

    #[test]
    fn test_taker_edges() {
        let up = book(0.48, 0.50);
        let down = book(0.47, 0.49);
        let edges = taker_edges(&up, &down).unwrap();
        // take UP: 1 - (0.50 + 0.47) = 0.03
        assert!((edges.take_up - 0.03).abs() < 1e-9);
        // take DOWN: 1 - (0.48 + 0.49) = 0.03
        assert!((edges.take_down - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_choose_requires_non_negative_edge() {
        let edges = TakerEdges {
            take_up: -0.01,
            take_down: -0.02,
        };
        assert_eq!(choose_taker_leg(edges, 1.0, 1.0, 0.0), None);

        let edges = TakerEdges {
            take_up: -0.01,
            take_down: 0.01,
        };
        assert_eq!(choose_taker_leg(edges, 1.0, 1.0, 0.0), Some(Leg::Down));
    }

    #[test]
    fn test_choose_prefers_heavier_size_factor() {
        let edges = TakerEdges {
            take_up: 0.01,
            take_down: 0.03,
        };
        // Size factors diverge by >= 0.05: factor wins over edge
        assert_eq!(choose_taker_leg(edges, 1.1, 0.9, 0.0), Some(Leg::Up));
    }

    #[test]
    fn test_choose_falls_back_to_edge_then_imbalance() {
        let edges = TakerEdges {
            take_up: 0.01,
            take_down: 0.03,
        };
        assert_eq!(choose_taker_leg(edges, 1.0, 1.0, 0.0), Some(Leg::Down));

        let tied = TakerEdges {
            take_up: 0.02,
            take_down: 0.02,
        };
        // UP-heavy: rebalancing leg is DOWN
        assert_eq!(choose_taker_leg(tied, 1.0, 1.0, 8.0), Some(Leg::Down));
        assert_eq!(choose_taker_leg(tied, 1.0, 1.0, -8.0), Some(Leg::Up));
    }

    #[test]
    fn test_fast_top_up_happy_path() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 10).unwrap();
        let inv = up_heavy_inventory(now - Duration::seconds(5), 0.48);
        let lag_book = book(0.48, 0.50);

        assert_eq!(fast_top_up_check(&cfg(), &inv, &lag_book, now), Ok(Leg::Down));
    }

    #[test]
    fn test_fast_top_up_holds() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 10).unwrap();
        let lag_book = book(0.48, 0.50);

        // Balanced
        let inv = MarketInventory::default();
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &lag_book, now),
            Err(TopUpHold::Balanced)
        );

        // Too soon after the leader's fill
        let inv = up_heavy_inventory(now, 0.48);
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &lag_book, now),
            Err(TopUpHold::OutsideFillWindow)
        );

        // Too long after
        let inv = up_heavy_inventory(now - Duration::seconds(31), 0.48);
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &lag_book, now),
            Err(TopUpHold::OutsideFillWindow)
        );

        // Cooldown
        let mut inv = up_heavy_inventory(now - Duration::seconds(5), 0.48);
        inv.last_top_up_at = Some(now - Duration::seconds(2));
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &lag_book, now),
            Err(TopUpHold::Cooldown)
        );

        // Spread too wide
        let inv = up_heavy_inventory(now - Duration::seconds(5), 0.48);
        let wide = book(0.44, 0.50);
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &wide, now),
            Err(TopUpHold::SpreadTooWide)
        );

        // Combined cost over 1 with a positive min edge
        let mut c = cfg();
        c.min_edge = 0.03;
        let inv = up_heavy_inventory(now - Duration::seconds(5), 0.48);
        assert_eq!(
            fast_top_up_check(&c, &inv, &lag_book, now),
            Err(TopUpHold::EdgeTooThin)
        );
    }

    #[test]
    fn test_fast_top_up_lagging_filled_after_leader() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 10).unwrap();
        let mut inv = up_heavy_inventory(now - Duration::seconds(5), 0.48);
        inv.down = LegPosition {
            shares: 2.0,
            cost: 1.0,
            last_fill_at: Some(now - Duration::seconds(1)),
            last_fill_price: Some(0.50),
        };
        let lag_book = book(0.48, 0.50);
        assert_eq!(
            fast_top_up_check(&cfg(), &inv, &lag_book, now),
            Err(TopUpHold::LaggingFilledAfterLeader)
        );
    }
}
