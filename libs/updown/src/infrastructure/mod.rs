//! Infrastructure Layer
//!
//! Implementations of the engine's external-facing contracts and shared
//! services: configuration, logging, the clock seam, the exchange adapter
//! trait, the book feed, bankroll smoothing, the inventory ledger, and the
//! best-effort event publisher. Depends on the domain layer only.

pub mod bankroll;
pub mod book_feed;
pub mod clock;
pub mod config;
pub mod events;
pub mod exchange;
pub mod inventory;
pub mod logging;

pub use bankroll::{BankrollService, BankrollSnapshot};
pub use book_feed::BookFeed;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    BankrollConfig, BankrollMode, ConfigError, DiscoveryConfig, DynamicSizingConfig, EngineConfig,
    FastTopUpConfig, HedgeDelayConfig, MomentumConfig, RiskConfig, SimConfig, TakerModeConfig,
    TopUpConfig, TradeTapeConfig,
};
pub use events::{
    DiscoveredMarketsEvent, EngineEvent, EventPublisher, OrderStatusEvent, SimFillKind,
    StatusDedup, UserTradeEvent,
};
pub use exchange::{
    Bankroll, ExchangeAdapter, ExchangeError, ExecutionMode, OrderQuery, PlacedOrder, Position,
    TickSizeCache,
};
pub use inventory::{InventoryLedger, LegPosition, MarketInventory};
pub use logging::{init_tracing, init_tracing_with_level};
