//! Instrument-keyed tick engine.
//!
//! Owns one [`InstrumentState`] per symbol, created on the first tick for
//! that symbol. Instruments share nothing, so a caller may shard symbols
//! across several engines and run them in parallel.

use std::collections::HashMap;
use tickagg_core::{
    try_ts_to_minute, validate_fields, EngineConfig, Result, Tick, TickOutcome, TimestampMs,
    VwapPoint,
};
use tracing::debug;

use crate::instrument::{InstrumentSnapshot, InstrumentState};
use crate::stats::EngineStats;

/// Single-owner streaming engine.
#[derive(Debug, Clone)]
pub struct TickEngine {
    config: EngineConfig,
    instruments: HashMap<String, InstrumentState>,
    stats: EngineStats,
}

impl TickEngine {
    /// Create an engine, validating the configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            instruments: HashMap::new(),
            stats: EngineStats::default(),
        })
    }

    /// Process one trade.
    ///
    /// Returns [`tickagg_core::Error::LateDropped`] for ticks behind the grace
    /// period; that error is informational and the engine stays usable.
    pub fn ingest(
        &mut self,
        ts_ms: TimestampMs,
        symbol: &str,
        price: f64,
        quantity: f64,
    ) -> Result<TickOutcome> {
        let result = self.apply(ts_ms, symbol, price, quantity);
        self.stats.record(&result);
        result
    }

    /// Process one trade from a [`Tick`].
    pub fn ingest_tick(&mut self, tick: &Tick) -> Result<TickOutcome> {
        self.ingest(tick.ts_ms, &tick.symbol, tick.price, tick.quantity)
    }

    fn apply(&mut self, ts_ms: TimestampMs, symbol: &str, price: f64, quantity: f64) -> Result<TickOutcome> {
        validate_fields(symbol, price, quantity)?;
        let minute = try_ts_to_minute(ts_ms)?;

        let config = &self.config;
        let state = self
            .instruments
            .entry(symbol.to_string())
            .or_insert_with(|| {
                debug!(symbol, "Creating instrument state");
                InstrumentState::new(symbol, config)
            });

        state.apply(minute, price, quantity)
    }

    /// Running average trade size for `symbol`.
    pub fn average_trade_size(&self, symbol: &str) -> Option<f64> {
        self.instruments.get(symbol)?.average_trade_size()
    }

    /// Number of trades recorded for `symbol`.
    pub fn trade_count(&self, symbol: &str) -> u64 {
        self.instruments
            .get(symbol)
            .map_or(0, |s| s.trade_size().trade_count())
    }

    /// Copy of the VWAP output series for `symbol` (empty if unknown).
    pub fn vwap_series(&self, symbol: &str) -> Vec<VwapPoint> {
        self.instruments
            .get(symbol)
            .map(InstrumentState::vwap_series)
            .unwrap_or_default()
    }

    /// VWAP of the newest series entry.
    pub fn latest_vwap(&self, symbol: &str) -> Option<f64> {
        self.instruments.get(symbol)?.latest_vwap()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<InstrumentSnapshot> {
        self.instruments.get(symbol).map(InstrumentState::snapshot)
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentState> {
        self.instruments.get(symbol)
    }

    /// Known symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_quarantined(&self, symbol: &str) -> bool {
        self.instruments
            .get(symbol)
            .is_some_and(InstrumentState::is_quarantined)
    }

    /// Drop all state for `symbol`. Returns whether it existed.
    pub fn evict(&mut self, symbol: &str) -> bool {
        let existed = self.instruments.remove(symbol).is_some();
        if existed {
            debug!(symbol, "Evicted instrument state");
        }
        existed
    }

    /// Discard `symbol`'s state, lifting any quarantine.
    pub fn reset(&mut self, symbol: &str) {
        if let Some(state) = self.instruments.get_mut(symbol) {
            state.reset();
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
