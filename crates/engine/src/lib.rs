//! Streaming tick-to-aggregate engine.
//!
//! This crate handles:
//! - Fixed-capacity, tail-addressed minute windows
//! - Running average trade size
//! - Rolling one-minute VWAP with gap filling
//! - Late-tick merging and retroactive series correction
//! - Per-instrument state tables, single-owner and shared

pub mod window;
pub mod trade_size;
pub mod series;
pub mod instrument;
pub mod stats;
pub mod engine;
pub mod shared;

pub use window::CircularWindow;
pub use trade_size::TradeSizeTracker;
pub use series::VwapSeries;
pub use instrument::{InstrumentSnapshot, InstrumentState};
pub use stats::{AtomicEngineStats, EngineStats};
pub use engine::TickEngine;
pub use shared::SharedTickEngine;
