//! Running mean of trade quantity.

use serde::{Deserialize, Serialize};
use tickagg_core::Size;

/// Per-instrument running average trade size.
///
/// Every tick is recorded regardless of how late it arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeSizeTracker {
    /// Sum of all recorded quantities.
    total_quantity: Size,
    /// Number of recorded trades.
    trade_count: u64,
}

impl TradeSizeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one trade.
    #[inline]
    pub fn record(&mut self, quantity: Size) {
        self.total_quantity += quantity;
        self.trade_count += 1;
    }

    /// Average quantity per trade, `None` before the first trade.
    pub fn average(&self) -> Option<f64> {
        if self.trade_count > 0 {
            Some(self.total_quantity / self.trade_count as f64)
        } else {
            None
        }
    }

    pub fn total_quantity(&self) -> Size {
        self.total_quantity
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty() {
        let tracker = TradeSizeTracker::new();
        assert_eq!(tracker.average(), None);
        assert_eq!(tracker.trade_count(), 0);
    }

    #[test]
    fn test_mean_after_each_trade() {
        let mut tracker = TradeSizeTracker::new();
        let quantities = [10.0, 5.0, 0.25, 120.0, 3.5];

        let mut sum = 0.0;
        for (i, &q) in quantities.iter().enumerate() {
            tracker.record(q);
            sum += q;
            assert_relative_eq!(tracker.average().unwrap(), sum / (i + 1) as f64);
        }
        assert_eq!(tracker.trade_count(), 5);
        assert_relative_eq!(tracker.total_quantity(), sum);
    }

    #[test]
    fn test_reset() {
        let mut tracker = TradeSizeTracker::new();
        tracker.record(7.0);
        tracker.reset();
        assert_eq!(tracker.average(), None);
    }
}
