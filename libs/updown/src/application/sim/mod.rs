//! Paper-fill simulator.
//!
//! Implements the exchange adapter contract against the live book feed, with
//! a queue-position fill model, an optional external trade tape, and the
//! cross-leg lead/lag floor the hedging logic depends on.

pub mod simulator;
pub mod tape;

pub use simulator::PaperSimulator;
pub use tape::{TapePrint, TradeTape, VecTape};
