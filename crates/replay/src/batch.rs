//! Offline recomputation from a complete tick set.
//!
//! Buckets every tick by minute up front and computes each rolling window
//! from scratch. This never runs on the streaming path; it exists to check
//! the engine's output after the fact.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tickagg_core::{Tick, TimestampMs, VwapPoint, MINUTE_MS};

#[derive(Debug, Clone, Default)]
struct SymbolTotals {
    total_quantity: f64,
    trade_count: u64,
    /// Minute -> (sum of price * quantity, sum of quantity).
    minutes: BTreeMap<TimestampMs, (f64, f64)>,
}

/// Batch aggregator over a full history.
#[derive(Debug, Clone)]
pub struct BatchAggregator {
    window_minutes: i64,
    symbols: HashMap<String, SymbolTotals>,
}

impl BatchAggregator {
    pub fn new(window_minutes: u32) -> Self {
        Self {
            window_minutes: window_minutes as i64,
            symbols: HashMap::new(),
        }
    }

    /// Count a tick toward both the trade-size mean and the VWAP buckets.
    pub fn add(&mut self, tick: &Tick) {
        self.add_trade_size(tick);
        let totals = self.symbols.entry(tick.symbol.clone()).or_default();
        let bucket = totals.minutes.entry(tick.minute()).or_insert((0.0, 0.0));
        bucket.0 += tick.price * tick.quantity;
        bucket.1 += tick.quantity;
    }

    /// Count a tick toward the trade-size mean only.
    pub fn add_trade_size(&mut self, tick: &Tick) {
        let totals = self.symbols.entry(tick.symbol.clone()).or_default();
        totals.total_quantity += tick.quantity;
        totals.trade_count += 1;
    }

    pub fn average_trade_size(&self, symbol: &str) -> Option<f64> {
        let totals = self.symbols.get(symbol)?;
        if totals.trade_count > 0 {
            Some(totals.total_quantity / totals.trade_count as f64)
        } else {
            None
        }
    }

    /// One point per minute from the first to the last traded minute.
    pub fn vwap_series(&self, symbol: &str) -> Vec<VwapPoint> {
        let Some(totals) = self.symbols.get(symbol) else {
            return Vec::new();
        };
        let (Some((&first, _)), Some((&last, _))) =
            (totals.minutes.first_key_value(), totals.minutes.last_key_value())
        else {
            return Vec::new();
        };

        let span = (self.window_minutes - 1) * MINUTE_MS;
        let mut series = Vec::with_capacity(((last - first) / MINUTE_MS + 1) as usize);
        let mut minute = first;
        while minute <= last {
            let (notional, quantity) = totals
                .minutes
                .range(minute - span..=minute)
                .fold((0.0, 0.0), |acc, (_, &(n, q))| (acc.0 + n, acc.1 + q));
            let vwap = (quantity > 0.0).then(|| notional / quantity);
            series.push(VwapPoint::new(minute, vwap));
            minute += MINUTE_MS;
        }
        series
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

/// A disagreement between the engine and the batch recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub symbol: String,
    /// Series minute, or `None` for the average trade size.
    pub minute: Option<TimestampMs>,
    pub engine: Option<f64>,
    pub batch: Option<f64>,
}

fn close_enough(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0),
        _ => false,
    }
}

/// Compare every engine series entry with the batch point for the same
/// minute.
///
/// Batch points without an engine counterpart (minutes before the engine's
/// first tick, or past its retention) are not compared.
pub fn compare(
    symbol: &str,
    engine: &[VwapPoint],
    batch: &[VwapPoint],
    tolerance: f64,
) -> Vec<Mismatch> {
    let by_minute: HashMap<TimestampMs, Option<f64>> =
        batch.iter().map(|p| (p.minute, p.vwap)).collect();

    engine
        .iter()
        .filter_map(|point| {
            let expected = by_minute.get(&point.minute).copied().flatten();
            (!close_enough(point.vwap, expected, tolerance)).then(|| Mismatch {
                symbol: symbol.to_string(),
                minute: Some(point.minute),
                engine: point.vwap,
                batch: expected,
            })
        })
        .collect()
}

/// Compare two average trade sizes.
pub fn compare_average(
    symbol: &str,
    engine: Option<f64>,
    batch: Option<f64>,
    tolerance: f64,
) -> Option<Mismatch> {
    (!close_enough(engine, batch, tolerance)).then(|| Mismatch {
        symbol: symbol.to_string(),
        minute: None,
        engine,
        batch,
    })
}
