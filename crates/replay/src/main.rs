//! `tick-replay`: stream a trade file through the engine and print the
//! resulting trade-size and VWAP series as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tickagg_core::Config;
use tickagg_replay::{logging::setup_logging, replay_file};

#[derive(Parser, Debug)]
#[command(
    name = "tick-replay",
    about = "Replay trade records through the rolling VWAP engine"
)]
struct Args {
    /// Trade file with a `timestamp,symbol,price,quantity` header.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rolling VWAP window in minutes.
    #[arg(long, value_name = "MINUTES")]
    window: Option<u32>,

    /// Grace period for late ticks in minutes.
    #[arg(long, value_name = "MINUTES")]
    grace: Option<u32>,

    /// Keep at most this many VWAP entries per instrument.
    #[arg(long, value_name = "ENTRIES")]
    retention: Option<usize>,

    /// Check the engine's output against a batch recomputation.
    #[arg(long)]
    verify: bool,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(window) = args.window {
        config.engine.vwap_window_minutes = window;
    }
    if let Some(grace) = args.grace {
        config.engine.grace_period_minutes = grace;
    }
    if args.retention.is_some() {
        config.engine.series_retention = args.retention;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level, args.json_logs);

    let config = load_config(&args)?;
    tracing::info!(
        input = %args.input.display(),
        window = config.engine.vwap_window_minutes,
        grace = config.engine.grace_period_minutes,
        "Starting replay"
    );

    let report = replay_file(&args.input, &config, args.verify)
        .with_context(|| format!("replaying {}", args.input.display()))?;

    let out = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");

    if let Some(verification) = &report.verification {
        if !verification.passed() {
            bail!(
                "{} of {} values disagree with the batch recomputation",
                verification.mismatches.len(),
                verification.checked
            );
        }
    }
    Ok(())
}
