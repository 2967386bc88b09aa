//! Domain Layer
//!
//! Pure types and math with no I/O: markets and legs, top-of-book records,
//! order state, and tick arithmetic. Everything above depends on this layer;
//! this layer depends on nothing but the clock types it is handed.

pub mod book;
pub mod market;
pub mod order;
pub mod price;

pub use book::{BookLevel, LastTrade, TopOfBook};
pub use market::{Leg, Market, SeriesKey};
pub use order::{Order, OrderStatus, Side};
pub use price::{
    ceil_to_tick, floor_to_tick, is_tick_multiple, quantize_size_down, ticks_between,
    PRICE_EPSILON,
};
