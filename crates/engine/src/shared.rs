//! Thread-safe engine with per-instrument serialization.
//!
//! The instrument table sits behind a read-write lock that is only taken for
//! writing when a symbol is seen for the first time (or evicted). Each
//! instrument's state sits behind its own mutex, so ticks for one symbol are
//! applied one at a time while different symbols proceed in parallel.
//!
//! Ticks are applied while the table read lock is held, so an eviction can
//! never remove an instrument between lookup and update.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tickagg_core::{
    try_ts_to_minute, validate_fields, EngineConfig, Result, Tick, TickOutcome, TimestampMs,
    VwapPoint,
};
use tracing::debug;

use crate::instrument::{InstrumentSnapshot, InstrumentState};
use crate::stats::{AtomicEngineStats, EngineStats};

type InstrumentHandle = Arc<Mutex<InstrumentState>>;

struct Shared {
    config: EngineConfig,
    instruments: RwLock<HashMap<String, InstrumentHandle>>,
    stats: AtomicEngineStats,
}

/// Cloneable handle to an engine shared between producer threads.
#[derive(Clone)]
pub struct SharedTickEngine {
    inner: Arc<Shared>,
}

impl SharedTickEngine {
    /// Create an engine, validating the configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Shared {
                config,
                instruments: RwLock::new(HashMap::new()),
                stats: AtomicEngineStats::default(),
            }),
        })
    }

    fn handle(&self, symbol: &str) -> Option<InstrumentHandle> {
        self.inner.instruments.read().get(symbol).cloned()
    }

    /// Run `f` on `symbol`'s state, creating it on first sight. The table
    /// stays read-locked while `f` runs.
    fn with_instrument<T>(&self, symbol: &str, f: impl FnOnce(&mut InstrumentState) -> T) -> T {
        loop {
            {
                let table = self.inner.instruments.read();
                if let Some(handle) = table.get(symbol) {
                    return f(&mut handle.lock());
                }
            }
            // Unknown, or evicted since the lookup: create it and look again.
            self.inner
                .instruments
                .write()
                .entry(symbol.to_string())
                .or_insert_with(|| {
                    debug!(symbol, "Creating instrument state");
                    Arc::new(Mutex::new(InstrumentState::new(symbol, &self.inner.config)))
                });
        }
    }

    /// Process one trade. See [`crate::TickEngine::ingest`].
    pub fn ingest(
        &self,
        ts_ms: TimestampMs,
        symbol: &str,
        price: f64,
        quantity: f64,
    ) -> Result<TickOutcome> {
        let result = validate_fields(symbol, price, quantity)
            .and_then(|()| try_ts_to_minute(ts_ms))
            .and_then(|minute| {
                self.with_instrument(symbol, |state| state.apply(minute, price, quantity))
            });
        self.inner.stats.record(&result);
        result
    }

    pub fn ingest_tick(&self, tick: &Tick) -> Result<TickOutcome> {
        self.ingest(tick.ts_ms, &tick.symbol, tick.price, tick.quantity)
    }

    pub fn average_trade_size(&self, symbol: &str) -> Option<f64> {
        self.handle(symbol)?.lock().average_trade_size()
    }

    pub fn vwap_series(&self, symbol: &str) -> Vec<VwapPoint> {
        self.handle(symbol)
            .map(|h| h.lock().vwap_series())
            .unwrap_or_default()
    }

    pub fn latest_vwap(&self, symbol: &str) -> Option<f64> {
        self.handle(symbol)?.lock().latest_vwap()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<InstrumentSnapshot> {
        self.handle(symbol).map(|h| h.lock().snapshot())
    }

    /// Known symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.inner.instruments.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_quarantined(&self, symbol: &str) -> bool {
        self.handle(symbol).is_some_and(|h| h.lock().is_quarantined())
    }

    /// Drop all state for `symbol`, returning its final snapshot.
    ///
    /// No tick is in flight for `symbol` once the table write lock is held,
    /// so the snapshot covers every tick applied before the eviction.
    pub fn evict(&self, symbol: &str) -> Option<InstrumentSnapshot> {
        let handle = self.inner.instruments.write().remove(symbol)?;
        let snapshot = handle.lock().snapshot();
        debug!(symbol, "Evicted instrument state");
        Some(snapshot)
    }

    /// Discard `symbol`'s state, lifting any quarantine.
    pub fn reset(&self, symbol: &str) {
        if let Some(handle) = self.handle(symbol) {
            handle.lock().reset();
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}
