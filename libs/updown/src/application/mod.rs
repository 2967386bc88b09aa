//! Application Layer
//!
//! The engine proper: market discovery, the order lifecycle manager, quote
//! calculation, the per-market directional state machine, and the paper-fill
//! simulator. Depends on domain and infrastructure.

pub mod discovery;
pub mod engine;
pub mod order_manager;
pub mod quote;
pub mod sim;

pub use discovery::{MarketCatalog, MarketDiscovery, SyntheticCatalog};
pub use engine::DirectionalEngine;
pub use order_manager::{CancelReason, OrderManager, ReplaceDecision};
pub use sim::{PaperSimulator, TapePrint, TradeTape};
