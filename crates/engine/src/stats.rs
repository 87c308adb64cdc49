//! Engine-wide ingest counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tickagg_core::{Error, Result, TickOutcome};

/// Counters over every tick offered to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Ticks offered to `ingest`.
    pub ticks_ingested: u64,
    /// Ticks that advanced an instrument's tail.
    pub ticks_advanced: u64,
    /// Ticks merged into the tail minute or a minute within the grace period.
    pub ticks_merged: u64,
    /// Ticks dropped for arriving later than the grace period.
    pub ticks_dropped_late: u64,
    /// Ticks rejected by field validation.
    pub ticks_malformed: u64,
    /// Ticks refused because the instrument is quarantined.
    pub ticks_refused: u64,
    /// Empty minutes synthesized during forward jumps.
    pub gap_minutes_filled: u64,
    /// Output series entries rewritten by late merges.
    pub series_corrections: u64,
    /// Instruments quarantined after a fatal error.
    pub instruments_quarantined: u64,
}

impl EngineStats {
    /// Fold the result of one ingest into the counters.
    pub fn record(&mut self, result: &Result<TickOutcome>) {
        self.ticks_ingested += 1;
        match result {
            Ok(TickOutcome::Advanced { minutes }) => {
                self.ticks_advanced += 1;
                self.gap_minutes_filled += minutes.saturating_sub(1);
            }
            Ok(TickOutcome::Merged { corrected, .. }) => {
                self.ticks_merged += 1;
                self.series_corrections += *corrected as u64;
            }
            Err(Error::LateDropped { .. }) => self.ticks_dropped_late += 1,
            Err(Error::MalformedInput(_)) => self.ticks_malformed += 1,
            Err(Error::Quarantined(_)) => self.ticks_refused += 1,
            Err(e) if e.is_fatal() => self.instruments_quarantined += 1,
            Err(_) => {}
        }
    }
}

/// Lock-free counterpart of [`EngineStats`] for the shared engine.
#[derive(Debug, Default)]
pub struct AtomicEngineStats {
    ticks_ingested: AtomicU64,
    ticks_advanced: AtomicU64,
    ticks_merged: AtomicU64,
    ticks_dropped_late: AtomicU64,
    ticks_malformed: AtomicU64,
    ticks_refused: AtomicU64,
    gap_minutes_filled: AtomicU64,
    series_corrections: AtomicU64,
    instruments_quarantined: AtomicU64,
}

impl AtomicEngineStats {
    pub fn record(&self, result: &Result<TickOutcome>) {
        self.ticks_ingested.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(TickOutcome::Advanced { minutes }) => {
                self.ticks_advanced.fetch_add(1, Ordering::Relaxed);
                self.gap_minutes_filled
                    .fetch_add(minutes.saturating_sub(1), Ordering::Relaxed);
            }
            Ok(TickOutcome::Merged { corrected, .. }) => {
                self.ticks_merged.fetch_add(1, Ordering::Relaxed);
                self.series_corrections
                    .fetch_add(*corrected as u64, Ordering::Relaxed);
            }
            Err(Error::LateDropped { .. }) => {
                self.ticks_dropped_late.fetch_add(1, Ordering::Relaxed);
            }
            Err(Error::MalformedInput(_)) => {
                self.ticks_malformed.fetch_add(1, Ordering::Relaxed);
            }
            Err(Error::Quarantined(_)) => {
                self.ticks_refused.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_fatal() => {
                self.instruments_quarantined.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            ticks_ingested: self.ticks_ingested.load(Ordering::Relaxed),
            ticks_advanced: self.ticks_advanced.load(Ordering::Relaxed),
            ticks_merged: self.ticks_merged.load(Ordering::Relaxed),
            ticks_dropped_late: self.ticks_dropped_late.load(Ordering::Relaxed),
            ticks_malformed: self.ticks_malformed.load(Ordering::Relaxed),
            ticks_refused: self.ticks_refused.load(Ordering::Relaxed),
            gap_minutes_filled: self.gap_minutes_filled.load(Ordering::Relaxed),
            series_corrections: self.series_corrections.load(Ordering::Relaxed),
            instruments_quarantined: self.instruments_quarantined.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> Vec<Result<TickOutcome>> {
        vec![
            Ok(TickOutcome::Advanced { minutes: 1 }),
            Ok(TickOutcome::Advanced { minutes: 6 }),
            Ok(TickOutcome::Merged { delta: -2, corrected: 3 }),
            Err(Error::LateDropped {
                symbol: "AAPL".into(),
                minute: 0,
                tail_minute: 600_000,
                grace: 3,
            }),
            Err(Error::malformed("bad quantity")),
            Err(Error::InconsistentSlot { expected: 0, found: 60_000 }),
            Err(Error::Quarantined("AAPL".into())),
        ]
    }

    #[test]
    fn test_record() {
        let mut stats = EngineStats::default();
        for result in &sample_results() {
            stats.record(result);
        }

        assert_eq!(stats.ticks_ingested, 7);
        assert_eq!(stats.ticks_advanced, 2);
        assert_eq!(stats.gap_minutes_filled, 5);
        assert_eq!(stats.ticks_merged, 1);
        assert_eq!(stats.series_corrections, 3);
        assert_eq!(stats.ticks_dropped_late, 1);
        assert_eq!(stats.ticks_malformed, 1);
        assert_eq!(stats.instruments_quarantined, 1);
        assert_eq!(stats.ticks_refused, 1);
    }

    #[test]
    fn test_atomic_matches_plain() {
        let mut plain = EngineStats::default();
        let atomic = AtomicEngineStats::default();
        for result in &sample_results() {
            plain.record(result);
            atomic.record(result);
        }
        assert_eq!(atomic.snapshot(), plain);
    }
}
