//! Paper-trading runner.
//!
//! Wires the full engine against the paper simulator: synthetic discovery,
//! a random-walk book driver standing in for the market-data transport, and
//! a drain task that logs every published event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use updown::domain::BookLevel;
use updown::infrastructure::{
    init_tracing_with_level, BankrollService, BookFeed, EngineConfig, EngineEvent, EventPublisher,
    ExchangeAdapter, InventoryLedger, SharedClock, SystemClock,
};
use updown::{
    DirectionalEngine, MarketDiscovery, OrderManager, PaperSimulator, ShutdownSignal,
    SyntheticCatalog,
};
use updown_mm_bot::bin_common::{print_banner, resolve_config_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();
    let cfg = if config_path.exists() {
        EngineConfig::load(&config_path)?
    } else {
        eprintln!(
            "Config file {:?} not found, running with defaults",
            config_path
        );
        EngineConfig::default()
    };

    init_tracing_with_level(&cfg.log_level);
    print_banner("updown-mm", "PAPER");
    cfg.log();

    let clock: SharedClock = Arc::new(SystemClock);
    let feed = Arc::new(BookFeed::new(Arc::clone(&clock)));
    let (publisher, events_rx) = EventPublisher::new();

    let sim = Arc::new(PaperSimulator::new(
        cfg.sim.clone(),
        cfg.tape.clone(),
        Arc::clone(&clock),
        Arc::clone(&feed),
        publisher.clone(),
        None,
        cfg.rng_seed,
    ));
    let adapter: Arc<dyn ExchangeAdapter> = sim.clone();

    let orders = Arc::new(OrderManager::new(
        Arc::clone(&adapter),
        Arc::clone(&clock),
        publisher.clone(),
    ));
    let inventory = Arc::new(InventoryLedger::new(Arc::clone(&clock)));
    let bankroll = Arc::new(BankrollService::new(
        cfg.bankroll.clone(),
        Arc::clone(&clock),
    ));
    let discovery = MarketDiscovery::new(
        Arc::new(SyntheticCatalog),
        Arc::clone(&clock),
        cfg.discovery.clone(),
    );

    let mut engine = DirectionalEngine::new(
        cfg.clone(),
        Arc::clone(&clock),
        Arc::clone(&feed),
        Arc::clone(&adapter),
        Arc::clone(&orders),
        Arc::clone(&inventory),
        Arc::clone(&bankroll),
        discovery,
        publisher.clone(),
    );
    // The simulator needs each market's token pairing for its lead/lag floor
    let sim_for_hook = Arc::clone(&sim);
    engine.set_market_hook(Box::new(move |market| sim_for_hook.register_market(market)));

    let shutdown = ShutdownSignal::new();
    shutdown.spawn_signal_handler();

    let bankroll_task = bankroll.spawn_refresh_task(Arc::clone(&adapter), shutdown.flag());
    let fill_task = sim.spawn_fill_task(shutdown.flag());
    let driver_task = tokio::spawn(drive_books(
        Arc::clone(&feed),
        shutdown.flag(),
        cfg.rng_seed,
    ));
    let drain_task = tokio::spawn(drain_events(events_rx, shutdown.flag()));

    engine.run(shutdown.flag()).await;

    for task in [bankroll_task, fill_task, driver_task, drain_task] {
        task.abort();
    }
    info!("updown-mm exited");
    Ok(())
}

/// Random-walk top-of-book generator. Each market's UP probability walks in
/// [0.30, 0.70]; the DOWN leg mirrors it so the pair stays near a complete
/// set. Stands in for the live market-data transport in paper runs.
async fn drive_books(feed: Arc<BookFeed>, shutdown_flag: Arc<AtomicBool>, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let mut walks: HashMap<String, f64> = HashMap::new();

    while shutdown_flag.load(Ordering::Acquire) {
        let tokens = feed.subscribed_tokens();
        for token in tokens {
            let Some(slug) = token.strip_suffix("-up") else {
                continue; // DOWN legs are derived from their UP sibling
            };
            let p = walks.entry(slug.to_string()).or_insert(0.50);
            *p = (*p + rng.gen_range(-0.01..0.01)).clamp(0.30, 0.70);

            let spread = 0.02;
            let up_bid = ((*p - spread / 2.0) * 100.0).round() / 100.0;
            let up_ask = up_bid + spread;
            let down_bid = ((1.0 - *p - spread / 2.0) * 100.0).round() / 100.0;
            let down_ask = down_bid + spread;

            feed.apply_quote(
                &token,
                Some(BookLevel::new(up_bid, rng.gen_range(50.0..250.0))),
                Some(BookLevel::new(up_ask, rng.gen_range(50.0..250.0))),
            );
            feed.apply_quote(
                &format!("{}-down", slug),
                Some(BookLevel::new(down_bid, rng.gen_range(50.0..250.0))),
                Some(BookLevel::new(down_ask, rng.gen_range(50.0..250.0))),
            );
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Log published events; a real deployment hands the receiver to an external
/// publisher instead.
async fn drain_events(
    rx: crossbeam_channel::Receiver<EngineEvent>,
    shutdown_flag: Arc<AtomicBool>,
) {
    while shutdown_flag.load(Ordering::Acquire) {
        for event in rx.try_iter() {
            match event {
                EngineEvent::OrderStatus(e) => info!(
                    "[Event] order {} {} {} {:.2}@{:.3} matched {:.2} remaining {:.2}{}",
                    e.order_id,
                    e.side,
                    e.status,
                    e.requested_size,
                    e.requested_price,
                    e.matched,
                    e.remaining,
                    e.error.map(|err| format!(" error={}", err)).unwrap_or_default()
                ),
                EngineEvent::UserTrade(e) => info!(
                    "[Event] trade {} {} {:.2}@{:.3} kind={}",
                    e.market,
                    e.side,
                    e.size,
                    e.price,
                    e.sim_kind.map(|k| k.to_string()).unwrap_or_default()
                ),
                EngineEvent::DiscoveredMarkets(e) => {
                    info!("[Event] heartbeat: {} active market(s)", e.slugs.len())
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    warn!("[Event] drain stopped");
}
