//! Up/Down Market-Making Engine - Core Library
//!
//! Directional market making for short-duration binary ("Up or Down")
//! prediction markets: paired-market discovery, a per-market quoting state
//! machine with inventory-aware skewing, an order lifecycle manager, and a
//! paper-fill simulator that stands in for the live exchange.
//!
//! ## Architecture
//!
//! - **domain**: Pure types and price math (markets, legs, books, orders).
//! - **infrastructure**: Config, logging, clock, the exchange adapter
//!   contract, book feed, bankroll, inventory ledger, event publishing.
//! - **application**: Discovery, order manager, quote calculator, the
//!   directional engine, and the paper simulator.
//! - **utils**: Shutdown plumbing shared by binaries.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;

// Commonly-used re-exports for binaries and integration tests
pub use application::{
    DirectionalEngine, MarketCatalog, MarketDiscovery, OrderManager, PaperSimulator,
    ReplaceDecision, SyntheticCatalog, TapePrint, TradeTape,
};
pub use domain::{BookLevel, Leg, Market, Order, OrderStatus, SeriesKey, Side, TopOfBook};
pub use infrastructure::{
    BankrollMode, BankrollService, BookFeed, Clock, EngineConfig, EngineEvent, EventPublisher,
    ExchangeAdapter, ExchangeError, ExecutionMode, InventoryLedger, ManualClock, SharedClock,
    SystemClock, init_tracing, init_tracing_with_level,
};
pub use utils::ShutdownSignal;
