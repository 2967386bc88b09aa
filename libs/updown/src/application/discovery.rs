//! Market discovery.
//!
//! Up/Down markets are minted on a fixed grid: one slot per 15 minutes and
//! one per hour for each supported asset. Discovery generates candidate
//! identifiers for the previous two, current, and next two slots of each
//! series, resolves them through the catalog, and merges the result with the
//! previously-known set so a transient lookup failure does not collapse
//! coverage.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Market, SeriesKey};
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::config::DiscoveryConfig;

/// Resolves a candidate slug to market details. Implemented by the external
/// market-catalog client; `SyntheticCatalog` stands in for paper runs.
#[async_trait]
pub trait MarketCatalog: Send + Sync {
    async fn fetch(&self, slug: &str) -> anyhow::Result<Option<Market>>;
}

/// Markets stay interesting this far ahead of their end time.
const MAX_HORIZON_SECS: i64 = 7_200;

/// A candidate slot for one series of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCandidate {
    pub slug: String,
    pub series: SeriesKey,
    pub end_time: DateTime<Utc>,
}

pub struct MarketDiscovery {
    catalog: Arc<dyn MarketCatalog>,
    clock: SharedClock,
    cfg: DiscoveryConfig,
    known: HashMap<String, Market>,
}

impl MarketDiscovery {
    pub fn new(catalog: Arc<dyn MarketCatalog>, clock: SharedClock, cfg: DiscoveryConfig) -> Self {
        Self {
            catalog,
            clock,
            cfg,
            known: HashMap::new(),
        }
    }

    /// Candidate slots: previous two, current, and next two slots of each
    /// 15-minute and 1-hour series per asset.
    pub fn candidate_slots(&self, now: DateTime<Utc>) -> Vec<SlotCandidate> {
        let mut out = Vec::new();
        for asset in &self.cfg.assets {
            for fifteen in [true, false] {
                let series = SeriesKey::from_asset_and_duration(asset, fifteen);
                let step = series.duration();
                let step_secs = step.num_seconds();
                let current_slot_end =
                    ((now.timestamp() / step_secs) + 1) * step_secs;
                for offset in -2i64..=2 {
                    let end_ts = current_slot_end + offset * step_secs;
                    let end_time = Utc.timestamp_opt(end_ts, 0).single().unwrap_or(now);
                    out.push(SlotCandidate {
                        slug: slot_slug(asset, series, end_time),
                        series,
                        end_time,
                    });
                }
            }
        }
        out
    }

    /// A market is active now iff its end time is within the horizon and the
    /// slot has started, minus the series' pre-warm window.
    pub fn is_active_now(market: &Market, now: DateTime<Utc>) -> bool {
        if market.end_time <= now || market.end_time > now + Duration::seconds(MAX_HORIZON_SECS) {
            return false;
        }
        let start = market.end_time - market.series.duration();
        now >= start - market.series.prewarm()
    }

    /// One discovery pass: resolve candidates, merge with the previous set,
    /// drop everything no longer active.
    pub async fn refresh(&mut self) -> Vec<Market> {
        let now = self.clock.now();

        for candidate in self.candidate_slots(now) {
            if self.known.contains_key(&candidate.slug) {
                continue;
            }
            match self.catalog.fetch(&candidate.slug).await {
                Ok(Some(market)) => {
                    debug!(
                        "[Discovery] Found {} (ends {})",
                        market.slug, market.end_time
                    );
                    self.known.insert(market.slug.clone(), market);
                }
                Ok(None) => {}
                Err(e) => {
                    // Keep whatever we already know; retry next pass
                    warn!("[Discovery] Lookup failed for {}: {}", candidate.slug, e);
                }
            }
        }

        // Expired markets drop out entirely; pre-window markets stay known
        self.known.retain(|_, market| !market.is_expired(now));

        let mut active: Vec<Market> = self
            .known
            .values()
            .filter(|m| Self::is_active_now(m, now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.slug.cmp(&b.slug)));
        active
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }
}

/// Deterministic slot identifier, e.g. `btc-updown-15m-1748779200`.
pub fn slot_slug(asset: &str, series: SeriesKey, end_time: DateTime<Utc>) -> String {
    let tf = if series.is_fifteen_minute() { "15m" } else { "1h" };
    format!(
        "{}-updown-{}-{}",
        asset.to_ascii_lowercase(),
        tf,
        end_time.timestamp()
    )
}

/// Paper-mode catalog: every candidate slug resolves to a market whose token
/// ids derive from the slug. Lets the paper binary and tests run the full
/// discovery path without a live catalog.
pub struct SyntheticCatalog;

#[async_trait]
impl MarketCatalog for SyntheticCatalog {
    async fn fetch(&self, slug: &str) -> anyhow::Result<Option<Market>> {
        // slug: <asset>-updown-<tf>-<end_ts>
        let parts: Vec<&str> = slug.split('-').collect();
        if parts.len() != 4 || parts[1] != "updown" {
            return Ok(None);
        }
        let end_ts: i64 = match parts[3].parse() {
            Ok(ts) => ts,
            Err(_) => return Ok(None),
        };
        let Some(end_time) = Utc.timestamp_opt(end_ts, 0).single() else {
            return Ok(None);
        };
        let series = SeriesKey::from_asset_and_duration(parts[0], parts[2] == "15m");
        Ok(Some(Market {
            slug: slug.to_string(),
            up_token: format!("{}-up", slug),
            down_token: format!("{}-down", slug),
            end_time,
            series,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{Clock, ManualClock};
    use parking_lot::Mutex;

    fn cfg() -> DiscoveryConfig {
        DiscoveryConfig {
            poll_secs: 10,
            assets: vec!["btc".to_string(), "eth".to_string()],
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_candidate_slots_cover_both_series() {
        let clock = Arc::new(ManualClock::new(at(12, 7, 0)));
        let discovery = MarketDiscovery::new(Arc::new(SyntheticCatalog), clock, cfg());

        let slots = discovery.candidate_slots(at(12, 7, 0));
        // 2 assets x 2 series x 5 slots
        assert_eq!(slots.len(), 20);

        // Current 15m slot for 12:07 ends at 12:15
        assert!(slots
            .iter()
            .any(|s| s.series == SeriesKey::Btc15m && s.end_time == at(12, 15, 0)));
        // Current 1h slot ends at 13:00
        assert!(slots
            .iter()
            .any(|s| s.series == SeriesKey::Eth1h && s.end_time == at(13, 0, 0)));
    }

    #[test]
    fn test_active_now_prewarm_window() {
        let market = Market {
            slug: "btc-updown-15m-x".to_string(),
            up_token: "u".to_string(),
            down_token: "d".to_string(),
            end_time: at(12, 15, 0),
            series: SeriesKey::Btc15m,
        };

        // Slot starts 12:00; prewarm 90s puts activation at 11:58:30
        assert!(!MarketDiscovery::is_active_now(&market, at(11, 58, 29)));
        assert!(MarketDiscovery::is_active_now(&market, at(11, 58, 30)));
        assert!(MarketDiscovery::is_active_now(&market, at(12, 14, 59)));
        assert!(!MarketDiscovery::is_active_now(&market, at(12, 15, 0)));
    }

    #[test]
    fn test_active_now_horizon() {
        let market = Market {
            slug: "btc-updown-1h-x".to_string(),
            up_token: "u".to_string(),
            down_token: "d".to_string(),
            end_time: at(15, 0, 0),
            series: SeriesKey::Btc1h,
        };
        // Ends more than 2h out
        assert!(!MarketDiscovery::is_active_now(&market, at(12, 30, 0)));
    }

    /// Catalog that fails every lookup after an initial success window.
    struct FlakyCatalog {
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl MarketCatalog for FlakyCatalog {
        async fn fetch(&self, slug: &str) -> anyhow::Result<Option<Market>> {
            if *self.fail.lock() {
                anyhow::bail!("catalog down");
            }
            SyntheticCatalog.fetch(slug).await
        }
    }

    #[tokio::test]
    async fn test_refresh_merges_with_previous_on_failure() {
        let clock = Arc::new(ManualClock::new(at(12, 7, 0)));
        let catalog = Arc::new(FlakyCatalog {
            fail: Mutex::new(false),
        });
        let mut discovery = MarketDiscovery::new(catalog.clone(), clock.clone(), cfg());

        let first = discovery.refresh().await;
        assert!(!first.is_empty());

        // Catalog goes down; coverage must not collapse
        *catalog.fail.lock() = true;
        clock.advance_millis(10_000);
        let second = discovery.refresh().await;
        assert_eq!(
            first.iter().map(|m| &m.slug).collect::<Vec<_>>(),
            second.iter().map(|m| &m.slug).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_refresh_drops_expired() {
        let clock = Arc::new(ManualClock::new(at(12, 7, 0)));
        let mut discovery =
            MarketDiscovery::new(Arc::new(SyntheticCatalog), clock.clone(), cfg());

        discovery.refresh().await;
        let before = discovery.known_count();
        assert!(before > 0);

        // Jump past every known end time
        clock.advance(Duration::hours(5));
        let active = discovery.refresh().await;
        assert!(active
            .iter()
            .all(|m| !m.is_expired(clock.now())));
    }
}
