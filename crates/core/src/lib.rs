//! Core types and configuration for the tick aggregation engine.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (ticks, minute slots, VWAP points)
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    Config, EngineConfig, IngestConfig, DEFAULT_SERIES_RETENTION, MAX_WINDOW_CAPACITY,
};
pub use error::{Error, Result};
pub use types::*;
