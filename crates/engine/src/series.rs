//! VWAP output series.
//!
//! One entry per minute the instrument's tail has advanced through, in minute
//! order. Appends only grow the end; late corrections rewrite entries in place,
//! addressed from the newest entry backwards.

use std::collections::VecDeque;
use tickagg_core::{TimestampMs, VwapPoint, MINUTE_MS};

/// Per-instrument output series with optional bounded retention.
#[derive(Debug, Clone, Default)]
pub struct VwapSeries {
    points: VecDeque<VwapPoint>,
    /// Maximum number of entries kept. `None` is unbounded.
    retention: Option<usize>,
    /// Entries dropped from the front by retention.
    evicted: u64,
}

impl VwapSeries {
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            points: VecDeque::new(),
            retention,
            evicted: 0,
        }
    }

    /// Append the entry for a newly advanced minute.
    pub fn push(&mut self, point: VwapPoint) {
        self.points.push_back(point);
        if let Some(limit) = self.retention {
            while self.points.len() > limit {
                self.points.pop_front();
                self.evicted += 1;
            }
        }
    }

    /// Append `count` null entries for consecutive minutes starting at
    /// `first`.
    ///
    /// With bounded retention only the entries that survive are built; the
    /// rest are counted as evicted.
    pub fn push_nulls(&mut self, first: TimestampMs, count: u64) {
        let kept = self.retention.map_or(count, |limit| count.min(limit as u64));
        let skipped = count - kept;
        self.evicted += skipped;
        for i in skipped..count {
            self.push(VwapPoint::new(first + i as i64 * MINUTE_MS, None));
        }
    }

    /// Overwrite the entry `back` positions before the newest one (`0` is the
    /// newest).
    ///
    /// Returns `false`, leaving the series untouched, when that entry was
    /// never emitted or has already been evicted.
    pub fn set_from_end(&mut self, back: usize, point: VwapPoint) -> bool {
        let len = self.points.len();
        if back >= len {
            return false;
        }
        let entry = &mut self.points[len - 1 - back];
        debug_assert_eq!(entry.minute, point.minute);
        *entry = point;
        true
    }

    /// Entry `back` positions before the newest one.
    pub fn get_from_end(&self, back: usize) -> Option<&VwapPoint> {
        let len = self.points.len();
        if back >= len {
            return None;
        }
        self.points.get(len - 1 - back)
    }

    /// Newest entry.
    pub fn latest(&self) -> Option<&VwapPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of entries dropped by retention.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &VwapPoint> {
        self.points.iter()
    }

    /// Owned copy of the retained entries, oldest first.
    pub fn to_vec(&self) -> Vec<VwapPoint> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.evicted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(minute: i64, vwap: Option<f64>) -> VwapPoint {
        VwapPoint::new(minute, vwap)
    }

    #[test]
    fn test_push_and_rewrite_from_end() {
        let mut series = VwapSeries::new(None);
        series.push(point(0, Some(100.0)));
        series.push(point(1, None));
        series.push(point(2, Some(110.0)));

        assert!(series.set_from_end(1, point(1, Some(95.0))));
        assert_eq!(series.to_vec(), vec![
            point(0, Some(100.0)),
            point(1, Some(95.0)),
            point(2, Some(110.0)),
        ]);
        assert_eq!(series.latest(), Some(&point(2, Some(110.0))));
    }

    #[test]
    fn test_rewrite_missing_entry_is_noop() {
        let mut series = VwapSeries::new(None);
        series.push(point(0, Some(100.0)));

        assert!(!series.set_from_end(1, point(-1, Some(90.0))));
        assert_eq!(series.len(), 1);
        assert_eq!(series.get_from_end(0), Some(&point(0, Some(100.0))));
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let mut series = VwapSeries::new(Some(2));
        series.push(point(0, Some(100.0)));
        series.push(point(1, Some(101.0)));
        series.push(point(2, Some(102.0)));

        assert_eq!(series.len(), 2);
        assert_eq!(series.evicted(), 1);
        assert_eq!(series.iter().next(), Some(&point(1, Some(101.0))));
        // Minute 0 is gone; correcting it does nothing
        assert!(!series.set_from_end(2, point(0, Some(1.0))));
    }

    #[test]
    fn test_push_nulls_keeps_only_retained_tail() {
        let mut series = VwapSeries::new(Some(3));
        series.push(point(0, Some(100.0)));
        series.push_nulls(MINUTE_MS, 1_000_000);

        assert_eq!(series.len(), 3);
        assert_eq!(series.evicted(), 998_998);
        assert_eq!(series.to_vec(), vec![
            point(999_998 * MINUTE_MS, None),
            point(999_999 * MINUTE_MS, None),
            point(1_000_000 * MINUTE_MS, None),
        ]);

        let mut unbounded = VwapSeries::new(None);
        unbounded.push_nulls(0, 4);
        assert_eq!(unbounded.len(), 4);
        assert_eq!(unbounded.latest(), Some(&point(3 * MINUTE_MS, None)));
    }
}
