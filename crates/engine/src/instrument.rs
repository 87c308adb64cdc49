//! Per-instrument VWAP state machine.
//!
//! Each tick is classified against the minute of the current tail:
//! - first tick, or a tick ahead of the tail: advance, filling skipped minutes
//!   with empty slots and emitting one series entry per minute
//! - at most `grace` minutes behind: merge into the existing slot and rewrite
//!   every series entry whose window spans it
//! - further behind: drop
//!
//! The trade-size mean is updated for every tick before classification.

use serde::Serialize;
use tickagg_core::{
    minutes_between, EngineConfig, Error, MinuteSlot, Result, SlotValue, TickOutcome,
    TimestampMs, VwapPoint, MINUTE_MS,
};
use tracing::{debug, error, warn};

use crate::series::VwapSeries;
use crate::trade_size::TradeSizeTracker;
use crate::window::CircularWindow;

/// Read-only view of one instrument's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    /// Minute of the tail, `None` before the first tick.
    pub tail_minute: Option<TimestampMs>,
    pub average_trade_size: Option<f64>,
    pub trade_count: u64,
    pub total_quantity: f64,
    pub latest_vwap: Option<f64>,
    pub series_len: usize,
    pub quarantined: bool,
}

/// Everything the engine owns for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    symbol: String,
    window: CircularWindow,
    trade_size: TradeSizeTracker,
    series: VwapSeries,
    /// Minute held by the tail slot.
    tail_minute: Option<TimestampMs>,
    window_minutes: usize,
    grace_minutes: u32,
    quarantined: bool,
}

impl InstrumentState {
    /// Create empty state for `symbol`.
    pub fn new(symbol: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            symbol: symbol.into(),
            window: CircularWindow::new(config.capacity()),
            trade_size: TradeSizeTracker::new(),
            series: VwapSeries::new(config.series_retention),
            tail_minute: None,
            window_minutes: config.vwap_window_minutes as usize,
            grace_minutes: config.grace_period_minutes,
            quarantined: false,
        }
    }

    /// Apply one tick already truncated to `minute`.
    ///
    /// A fatal error quarantines the instrument; every later tick is refused
    /// with [`Error::Quarantined`].
    pub fn apply(&mut self, minute: TimestampMs, price: f64, quantity: f64) -> Result<TickOutcome> {
        if self.quarantined {
            return Err(Error::Quarantined(self.symbol.clone()));
        }

        let delta = match self.tail_minute {
            Some(tail_minute) => Some(minutes_between(tail_minute, minute).ok_or_else(|| {
                Error::malformed(format!(
                    "{}: minute {minute} too far from tail {tail_minute}",
                    self.symbol
                ))
            })?),
            None => None,
        };

        self.trade_size.record(quantity);

        let result = self.apply_vwap(minute, delta, price, quantity);
        if let Err(e) = &result {
            if e.is_fatal() {
                self.quarantined = true;
                error!(symbol = %self.symbol, error = %e, "Instrument quarantined");
            }
        }
        result
    }

    fn apply_vwap(
        &mut self,
        minute: TimestampMs,
        delta: Option<i64>,
        price: f64,
        quantity: f64,
    ) -> Result<TickOutcome> {
        let (Some(tail_minute), Some(delta)) = (self.tail_minute, delta) else {
            debug!(symbol = %self.symbol, minute, "First tick for instrument");
            return Ok(self.advance(minute, 1, price, quantity));
        };

        if delta > 0 {
            Ok(self.advance(minute, delta as u64, price, quantity))
        } else if delta >= -(self.grace_minutes as i64) {
            self.merge_late(tail_minute, minute, delta, price, quantity)
        } else {
            warn!(
                symbol = %self.symbol,
                minute,
                tail_minute,
                grace = self.grace_minutes,
                "Late tick dropped"
            );
            Err(Error::LateDropped {
                symbol: self.symbol.clone(),
                minute,
                tail_minute,
                grace: self.grace_minutes,
            })
        }
    }

    /// Advance the tail `minutes` times; only the last minute carries the trade.
    fn advance(&mut self, minute: TimestampMs, minutes: u64, price: f64, quantity: f64) -> TickOutcome {
        let gap = minutes - 1;
        if gap > 0 {
            debug!(symbol = %self.symbol, gap_minutes = gap, "Filling skipped minutes");
        }

        // After `capacity` empty appends the ring holds no trade, so the rest
        // of the gap is a run of null entries that never touches the ring.
        let through_ring = gap.min(self.window.capacity() as u64);
        let mut back = gap;
        while back > gap - through_ring {
            self.push_minute(minute - back as i64 * MINUTE_MS, None);
            back -= 1;
        }
        if back > 0 {
            self.series.push_nulls(minute - back as i64 * MINUTE_MS, back);
            self.tail_minute = Some(minute - MINUTE_MS);
        }
        self.push_minute(minute, Some(SlotValue::new(minute, price, quantity)));

        TickOutcome::Advanced { minutes }
    }

    fn push_minute(&mut self, slot_minute: TimestampMs, slot: MinuteSlot) {
        self.window.append(slot);
        self.tail_minute = Some(slot_minute);

        let vwap = self.window.vwap(self.window_minutes, 0);
        self.series.push(VwapPoint::new(slot_minute, vwap));
    }

    /// Merge a tick `delta` (<= 0) minutes behind the tail and correct the
    /// series entries from that minute up to the tail.
    fn merge_late(
        &mut self,
        tail_minute: TimestampMs,
        minute: TimestampMs,
        delta: i64,
        price: f64,
        quantity: f64,
    ) -> Result<TickOutcome> {
        let merged = match self.window.get(delta)? {
            Some(slot) => {
                if slot.minute != minute {
                    return Err(Error::InconsistentSlot {
                        expected: minute,
                        found: slot.minute,
                    });
                }
                slot.merge(price, quantity)
            }
            None => SlotValue::new(minute, price, quantity),
        };
        self.window.update(delta, Some(merged))?;

        let mut corrected = 0u32;
        for offset in delta..=0 {
            let vwap = self.window.vwap(self.window_minutes, offset);
            let point = VwapPoint::new(tail_minute + offset * MINUTE_MS, vwap);
            // Entries before the first tick or past retention are skipped.
            if self.series.set_from_end(offset.unsigned_abs() as usize, point) {
                corrected += 1;
            }
        }

        if delta < 0 {
            debug!(symbol = %self.symbol, delta, corrected, "Corrected series for late tick");
        }

        Ok(TickOutcome::Merged {
            delta: delta as i32,
            corrected,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tail_minute(&self) -> Option<TimestampMs> {
        self.tail_minute
    }

    pub fn average_trade_size(&self) -> Option<f64> {
        self.trade_size.average()
    }

    pub fn trade_size(&self) -> &TradeSizeTracker {
        &self.trade_size
    }

    pub fn series(&self) -> &VwapSeries {
        &self.series
    }

    pub fn window(&self) -> &CircularWindow {
        &self.window
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    /// Owned copy of the output series.
    pub fn vwap_series(&self) -> Vec<VwapPoint> {
        self.series.to_vec()
    }

    pub fn latest_vwap(&self) -> Option<f64> {
        self.series.latest().and_then(|p| p.vwap)
    }

    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: self.symbol.clone(),
            tail_minute: self.tail_minute,
            average_trade_size: self.trade_size.average(),
            trade_count: self.trade_size.trade_count(),
            total_quantity: self.trade_size.total_quantity(),
            latest_vwap: self.latest_vwap(),
            series_len: self.series.len(),
            quarantined: self.quarantined,
        }
    }

    /// Discard all state, including quarantine.
    pub fn reset(&mut self) {
        self.window.clear();
        self.trade_size.reset();
        self.series.clear();
        self.tail_minute = None;
        self.quarantined = false;
    }

    #[cfg(test)]
    pub(crate) fn window_mut(&mut self) -> &mut CircularWindow {
        &mut self.window
    }
}
