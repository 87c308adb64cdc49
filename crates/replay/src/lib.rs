//! Replay tooling for the tick aggregation engine.
//!
//! This crate provides:
//! - File replay through the streaming engine
//! - Batch recomputation used to verify the engine's output
//! - Logging setup for the `tick-replay` binary

pub mod batch;
pub mod logging;
pub mod replay;

pub use batch::{BatchAggregator, Mismatch};
pub use replay::{replay_file, replay_reader, InstrumentReport, ReplayReport, Verification};
