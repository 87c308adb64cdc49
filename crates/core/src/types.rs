//! Core data types for the tick aggregation engine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Size/quantity type.
pub type Size = f64;

/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60_000;

/// Convert a timestamp to minute boundary.
///
/// Floors toward negative infinity so pre-epoch instants land on the minute
/// that contains them.
#[inline]
pub fn ts_to_minute(ts_ms: TimestampMs) -> TimestampMs {
    ts_ms.div_euclid(MINUTE_MS) * MINUTE_MS
}

/// Minute boundary of `ts_ms`, rejecting instants whose minute is not
/// representable (the first partial minute of the `i64` range).
pub fn try_ts_to_minute(ts_ms: TimestampMs) -> Result<TimestampMs> {
    ts_ms
        .div_euclid(MINUTE_MS)
        .checked_mul(MINUTE_MS)
        .ok_or_else(|| Error::malformed(format!("timestamp {ts_ms} out of range")))
}

/// Whole minutes elapsed from `from` to `to`, both minute-aligned.
///
/// `None` when the distance overflows `i64`.
#[inline]
pub fn minutes_between(from: TimestampMs, to: TimestampMs) -> Option<i64> {
    to.checked_sub(from).map(|d| d.div_euclid(MINUTE_MS))
}

/// A single trade execution for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Execution time in milliseconds.
    pub ts_ms: TimestampMs,
    /// Instrument identifier (e.g., "AAPL").
    pub symbol: String,
    /// Execution price.
    pub price: f64,
    /// Executed quantity.
    pub quantity: Size,
}

impl Tick {
    /// Create a new tick.
    pub fn new(ts_ms: TimestampMs, symbol: impl Into<String>, price: f64, quantity: Size) -> Self {
        Self {
            ts_ms,
            symbol: symbol.into(),
            price,
            quantity,
        }
    }

    /// Minute bucket this tick belongs to.
    #[inline]
    pub fn minute(&self) -> TimestampMs {
        ts_to_minute(self.ts_ms)
    }

    /// Check that the tick carries usable numbers.
    ///
    /// Price may be any finite value (spreads trade negative). Quantity must
    /// be strictly positive: a zero-size trade would turn the
    /// quantity-weighted merge into a division by zero.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.symbol, self.price, self.quantity)
    }
}

/// Field-level validation shared by [`Tick::validate`] and the engine's
/// borrowed ingest path.
pub fn validate_fields(symbol: &str, price: f64, quantity: Size) -> Result<()> {
    if symbol.is_empty() {
        return Err(Error::malformed("empty symbol"));
    }
    if !price.is_finite() {
        return Err(Error::malformed(format!("{symbol}: invalid price {price}")));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::malformed(format!("{symbol}: invalid quantity {quantity}")));
    }
    Ok(())
}

/// Aggregate of every trade merged into one minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotValue {
    /// Minute boundary this aggregate represents.
    pub minute: TimestampMs,
    /// Quantity-weighted price of the merged trades.
    pub price: f64,
    /// Summed quantity of the merged trades.
    pub quantity: Size,
}

impl SlotValue {
    /// Create a slot holding a single trade.
    pub fn new(minute: TimestampMs, price: f64, quantity: Size) -> Self {
        Self {
            minute,
            price,
            quantity,
        }
    }

    /// Price times quantity.
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Fold another trade into this minute by quantity-weighted price.
    pub fn merge(&self, price: f64, quantity: Size) -> Self {
        let total = self.quantity + quantity;
        Self {
            minute: self.minute,
            price: (self.notional() + price * quantity) / total,
            quantity: total,
        }
    }
}

/// One ring-buffer cell. `None` is a minute with no observed trade.
pub type MinuteSlot = Option<SlotValue>;

/// One entry of the VWAP output series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VwapPoint {
    /// Minute boundary the rolling window ends at.
    pub minute: TimestampMs,
    /// Rolling VWAP, `None` when every minute in the window is empty.
    pub vwap: Option<f64>,
}

impl VwapPoint {
    pub fn new(minute: TimestampMs, vwap: Option<f64>) -> Self {
        Self { minute, vwap }
    }
}

/// How an accepted tick was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// The tail advanced by this many minutes (gap minutes included).
    Advanced { minutes: u64 },
    /// The tick was merged into the minute `delta` minutes behind the tail;
    /// `corrected` series entries were rewritten.
    Merged { delta: i32, corrected: u32 },
}

impl TickOutcome {
    /// Is this a late merge?
    pub fn is_late(self) -> bool {
        matches!(self, TickOutcome::Merged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ts_to_minute() {
        // 2024-01-01 00:01:30.500 -> 2024-01-01 00:01:00.000
        let ts = 1704067290500i64;
        let minute = ts_to_minute(ts);
        assert_eq!(minute, 1704067260000);
    }

    #[test]
    fn test_ts_to_minute_before_epoch() {
        assert_eq!(ts_to_minute(-1), -60_000);
        assert_eq!(ts_to_minute(-60_000), -60_000);
    }

    #[test]
    fn test_minutes_between() {
        assert_eq!(minutes_between(0, 6 * MINUTE_MS), Some(6));
        assert_eq!(minutes_between(6 * MINUTE_MS, 4 * MINUTE_MS), Some(-2));
        assert_eq!(minutes_between(MINUTE_MS, MINUTE_MS), Some(0));
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        assert_eq!(minutes_between(ts_to_minute(i64::MAX), -MINUTE_MS * 2), None);
        assert!(try_ts_to_minute(i64::MIN).is_err());
        assert_eq!(try_ts_to_minute(-1).unwrap(), -60_000);
        assert_eq!(try_ts_to_minute(i64::MAX).unwrap(), ts_to_minute(i64::MAX));
    }

    #[test]
    fn test_slot_merge_is_quantity_weighted() {
        let slot = SlotValue::new(0, 100.0, 10.0);
        let merged = slot.merge(110.0, 30.0);
        // (100*10 + 110*30) / 40 = 107.5
        assert_relative_eq!(merged.price, 107.5);
        assert_relative_eq!(merged.quantity, 40.0);
        assert_eq!(merged.minute, 0);
    }

    #[test]
    fn test_tick_validate() {
        assert!(Tick::new(0, "AAPL", 100.0, 1.0).validate().is_ok());
        assert!(Tick::new(0, "", 100.0, 1.0).validate().is_err());
        assert!(Tick::new(0, "AAPL", f64::NAN, 1.0).validate().is_err());
        assert!(Tick::new(0, "AAPL", f64::INFINITY, 1.0).validate().is_err());
        // Negative and zero prices are legitimate
        assert!(Tick::new(0, "CL-SPREAD", -2.5, 1.0).validate().is_ok());
        assert!(Tick::new(0, "CL-SPREAD", 0.0, 1.0).validate().is_ok());
        assert!(Tick::new(0, "AAPL", 100.0, 0.0).validate().is_err());
        assert!(Tick::new(0, "AAPL", 100.0, -2.0).validate().is_err());
    }

    #[test]
    fn test_vwap_point_serializes_null() {
        let json = serde_json::to_string(&VwapPoint::new(60_000, None)).unwrap();
        assert_eq!(json, r#"{"minute":60000,"vwap":null}"#);
    }
}
