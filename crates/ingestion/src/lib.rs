//! Record ingestion for the tick aggregation engine.
//!
//! This crate handles:
//! - Header-driven column resolution
//! - Timestamp and decimal parsing
//! - Rejecting malformed records before they reach the engine

pub mod parser;

pub use parser::{ParseStats, RecordParser, TickReader};
