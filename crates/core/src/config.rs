//! Configuration structures for the tick aggregation engine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on `vwap_window_minutes + grace_period_minutes`.
pub const MAX_WINDOW_CAPACITY: u32 = 64;

/// Default number of output series entries kept per instrument (one day of
/// minutes).
pub const DEFAULT_SERIES_RETENTION: usize = 1440;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation engine configuration.
    pub engine: EngineConfig,
    /// Record parsing configuration.
    pub ingest: IngestConfig,
}

impl Config {
    /// Parse and validate a JSON configuration.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()
    }
}

/// Rolling VWAP configuration, fixed at engine construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the rolling VWAP window in minutes.
    pub vwap_window_minutes: u32,
    /// How many minutes behind the tail a tick may arrive and still be merged.
    pub grace_period_minutes: u32,
    /// Maximum number of output series entries kept per instrument (newest
    /// first). `None` keeps every entry, so memory then grows with the
    /// minutes an instrument spans.
    pub series_retention: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vwap_window_minutes: 5,
            grace_period_minutes: 3,
            series_retention: Some(DEFAULT_SERIES_RETENTION),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with the given window and grace period.
    pub fn new(vwap_window_minutes: u32, grace_period_minutes: u32) -> Self {
        Self {
            vwap_window_minutes,
            grace_period_minutes,
            series_retention: Some(DEFAULT_SERIES_RETENTION),
        }
    }

    /// Ring-buffer capacity in minutes.
    #[inline]
    pub fn capacity(&self) -> usize {
        (self.vwap_window_minutes + self.grace_period_minutes) as usize
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.vwap_window_minutes == 0 {
            return Err(Error::config("vwap_window_minutes must be positive"));
        }
        if self.grace_period_minutes == 0 {
            return Err(Error::config("grace_period_minutes must be positive"));
        }
        let capacity = self.vwap_window_minutes.saturating_add(self.grace_period_minutes);
        if capacity > MAX_WINDOW_CAPACITY {
            return Err(Error::config(format!(
                "window + grace = {capacity} exceeds maximum capacity {MAX_WINDOW_CAPACITY}"
            )));
        }
        if let Some(retention) = self.series_retention {
            // Corrections reach back grace minutes from the newest entry.
            if retention <= self.grace_period_minutes as usize {
                return Err(Error::config(format!(
                    "series_retention {retention} must exceed grace_period_minutes {}",
                    self.grace_period_minutes
                )));
            }
        }
        Ok(())
    }
}

/// Record parsing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// `chrono` format for naive UTC timestamps.
    pub timestamp_format: String,
    /// Log and skip malformed lines instead of aborting the replay.
    pub skip_malformed: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y-%m-%dT%H:%M:%SZ".to_string(),
            skip_malformed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.vwap_window_minutes, 5);
        assert_eq!(config.engine.grace_period_minutes, 3);
        assert_eq!(config.engine.capacity(), 8);
        assert!(config.ingest.skip_malformed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_window() {
        assert!(EngineConfig::new(0, 3).validate().is_err());
        assert!(EngineConfig::new(5, 0).validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_capacity() {
        assert!(EngineConfig::new(60, 4).validate().is_ok());
        assert!(EngineConfig::new(60, 5).validate().is_err());
    }

    #[test]
    fn test_rejects_short_retention() {
        let mut config = EngineConfig::new(5, 3);
        config.series_retention = Some(3);
        assert!(config.validate().is_err());
        config.series_retention = Some(4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_is_bounded_by_default() {
        assert_eq!(EngineConfig::default().series_retention, Some(DEFAULT_SERIES_RETENTION));
        assert_eq!(EngineConfig::new(10, 2).series_retention, Some(DEFAULT_SERIES_RETENTION));

        // An explicit null opts out of the bound
        let config = Config::from_json_str(r#"{"engine": {"series_retention": null}}"#).unwrap();
        assert_eq!(config.engine.series_retention, None);
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json_str(r#"{"engine": {"grace_period_minutes": 6}}"#).unwrap();
        assert_eq!(config.engine.vwap_window_minutes, 5);
        assert_eq!(config.engine.grace_period_minutes, 6);
        assert_eq!(config.ingest.timestamp_format, "%Y-%m-%dT%H:%M:%SZ");
    }

    #[test]
    fn test_invalid_json_config() {
        assert!(matches!(
            Config::from_json_str(r#"{"engine": {"vwap_window_minutes": 0}}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(Config::from_json_str("{"), Err(Error::Json(_))));
    }
}
