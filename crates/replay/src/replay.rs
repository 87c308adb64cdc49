//! Replay of recorded trade files through the engine.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tickagg_core::{Config, Error, Result, VwapPoint};
use tickagg_engine::{EngineStats, TickEngine};
use tickagg_ingestion::{ParseStats, RecordParser};
use tracing::{info, warn};

use crate::batch::{compare, compare_average, BatchAggregator, Mismatch};

/// Relative tolerance used when checking the engine against the batch
/// recomputation.
pub const VERIFY_TOLERANCE: f64 = 1e-9;

/// Final state of one instrument after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentReport {
    pub average_trade_size: Option<f64>,
    pub trade_count: u64,
    pub quarantined: bool,
    pub vwaps: Vec<VwapPoint>,
}

/// Outcome of checking the engine against the batch recomputation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Verification {
    /// Values compared.
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub stats: EngineStats,
    pub parse: ParseStats,
    pub instruments: BTreeMap<String, InstrumentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

/// Replay a trade file.
pub fn replay_file(path: impl AsRef<Path>, config: &Config, verify: bool) -> Result<ReplayReport> {
    let file = File::open(path.as_ref())?;
    replay_reader(file, config, verify)
}

/// Replay delimited trade records from `reader`.
///
/// Malformed lines (undecodable bytes included) are logged and skipped when
/// `config.ingest.skip_malformed` is set and abort the replay otherwise. A
/// read failure always aborts. Late drops and quarantined
/// instruments never abort. With `verify`, the engine's output is checked
/// against a batch recomputation over the ticks the engine accepted.
pub fn replay_reader<R: Read>(reader: R, config: &Config, verify: bool) -> Result<ReplayReport> {
    let mut engine = TickEngine::new(config.engine.clone())?;
    let mut batch = verify.then(|| BatchAggregator::new(config.engine.vwap_window_minutes));

    let mut ticks = RecordParser::new(config.ingest.clone()).parse_reader(reader);
    for item in ticks.by_ref() {
        let tick = match item {
            Ok(tick) => tick,
            Err(Error::MalformedInput(msg)) if config.ingest.skip_malformed => {
                warn!(error = %msg, "Skipping malformed record");
                continue;
            }
            Err(e) => return Err(e),
        };

        match engine.ingest_tick(&tick) {
            Ok(_) => {
                if let Some(batch) = batch.as_mut() {
                    batch.add(&tick);
                }
            }
            Err(e) if e.is_late_drop() => {
                if let Some(batch) = batch.as_mut() {
                    batch.add_trade_size(&tick);
                }
            }
            Err(e) => {
                warn!(symbol = %tick.symbol, error = %e, "Tick rejected");
            }
        }
    }

    let parse = ticks.stats().clone();
    let stats = engine.stats().clone();
    info!(
        ticks = stats.ticks_ingested,
        dropped_late = stats.ticks_dropped_late,
        malformed_lines = parse.malformed,
        instruments = engine.symbols().len(),
        "Replay finished"
    );

    let instruments: BTreeMap<String, InstrumentReport> = engine
        .symbols()
        .into_iter()
        .filter_map(|symbol| {
            let state = engine.instrument(&symbol)?;
            let report = InstrumentReport {
                average_trade_size: state.average_trade_size(),
                trade_count: state.trade_size().trade_count(),
                quarantined: state.is_quarantined(),
                vwaps: state.vwap_series(),
            };
            Some((symbol, report))
        })
        .collect();

    let verification = batch.map(|batch| verify_against(&instruments, &batch));

    Ok(ReplayReport {
        stats,
        parse,
        instruments,
        verification,
    })
}

fn verify_against(instruments: &BTreeMap<String, InstrumentReport>, batch: &BatchAggregator) -> Verification {
    let mut verification = Verification::default();

    for (symbol, report) in instruments {
        // A quarantined instrument stopped mid-stream; the batch view does not.
        if report.quarantined {
            continue;
        }

        verification.checked += 1;
        if let Some(mismatch) = compare_average(
            symbol,
            report.average_trade_size,
            batch.average_trade_size(symbol),
            VERIFY_TOLERANCE,
        ) {
            verification.mismatches.push(mismatch);
        }

        let expected = batch.vwap_series(symbol);
        verification.checked += report.vwaps.len();
        verification
            .mismatches
            .extend(compare(symbol, &report.vwaps, &expected, VERIFY_TOLERANCE));
    }

    if !verification.passed() {
        warn!(mismatches = verification.mismatches.len(), "Verification failed");
    }
    verification
}
