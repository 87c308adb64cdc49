//! Error types for the tick aggregation engine.

use crate::types::TimestampMs;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tick aggregation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Ring-buffer addressing beyond its capacity.
    #[error("Offset {delta} out of range for window capacity {capacity}")]
    OutOfRange { delta: i64, capacity: usize },

    /// Tick arrived further behind the tail than the grace period allows.
    #[error("Late tick dropped for {symbol}: minute {minute} is behind tail {tail_minute} by more than {grace} minutes")]
    LateDropped {
        symbol: String,
        minute: TimestampMs,
        tail_minute: TimestampMs,
        grace: u32,
    },

    /// A looked-up slot does not hold the minute it should represent.
    #[error("Inconsistent slot: expected minute {expected}, found {found}")]
    InconsistentSlot {
        expected: TimestampMs,
        found: TimestampMs,
    },

    /// Instrument stopped accepting ticks after a fatal error.
    #[error("Instrument quarantined: {0}")]
    Quarantined(String),

    /// Input record that could not be turned into a tick.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a malformed input error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    /// Create an out-of-range error.
    pub fn out_of_range(delta: i64, capacity: usize) -> Self {
        Error::OutOfRange { delta, capacity }
    }

    /// Fatal errors corrupt an instrument's state and quarantine it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OutOfRange { .. } | Error::InconsistentSlot { .. })
    }

    /// Late drops are part of normal operation.
    pub fn is_late_drop(&self) -> bool {
        matches!(self, Error::LateDropped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::out_of_range(-8, 8).is_fatal());
        assert!(Error::InconsistentSlot { expected: 0, found: 60_000 }.is_fatal());
        assert!(!Error::malformed("bad").is_fatal());
        assert!(!Error::Quarantined("AAPL".into()).is_fatal());

        let late = Error::LateDropped {
            symbol: "AAPL".into(),
            minute: 0,
            tail_minute: 240_000,
            grace: 3,
        };
        assert!(!late.is_fatal());
        assert!(late.is_late_drop());
    }
}
