//! Directional engine.
//!
//! Per-tick state machine over the active market set plus the probabilistic
//! heuristics it leans on: momentum, hedge-delay sampling, maker improvement,
//! size skew, and taker-leg selection. All per-market mutable state lives in
//! one `MarketState` record owned by the engine task.

pub mod engine;
pub mod hedge;
pub mod improve;
pub mod momentum;
pub mod sizing;
pub mod state;
pub mod taker;

pub use engine::DirectionalEngine;
pub use momentum::MomentumSignal;
pub use state::MarketState;
