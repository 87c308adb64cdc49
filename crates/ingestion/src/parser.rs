//! Trade record parsing.
//!
//! Turns CSV records (`timestamp,symbol,price,quantity` in any column order,
//! named by a header line) into validated [`Tick`]s. Anything that cannot be
//! parsed is reported as [`Error::MalformedInput`] and never reaches the
//! engine.

use chrono::{DateTime, NaiveDateTime};
use csv::{ByteRecord, DeserializeErrorKind, ErrorKind, ReaderBuilder};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tickagg_core::{Error, IngestConfig, Result, Tick, TimestampMs};

/// Statistics about parsing quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Data lines seen (header and blank lines excluded).
    pub lines: u64,
    /// Lines turned into ticks.
    pub ticks: u64,
    /// Lines rejected as malformed.
    pub malformed: u64,
}

impl ParseStats {
    /// Fraction of data lines that were malformed.
    pub fn malformed_frac(&self) -> f64 {
        if self.lines > 0 {
            self.malformed as f64 / self.lines as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One trade row as it appears on disk.
#[derive(Debug, Deserialize)]
struct TradeRecord {
    timestamp: String,
    symbol: String,
    price: f64,
    quantity: f64,
}

const COLUMNS: [&str; 4] = ["timestamp", "symbol", "price", "quantity"];

/// How data records map onto [`TradeRecord`] fields.
#[derive(Debug, Clone)]
enum Layout {
    /// Waiting for the header line.
    Pending,
    /// Fields matched by the (lowercased) header names.
    Named(ByteRecord),
    /// Fields taken in `timestamp,symbol,price,quantity` order.
    Positional,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    // The header is handled here so that headerless input and blank-only
    // records share one path.
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

/// Describe a record-level CSV failure.
fn describe(err: &csv::Error) -> String {
    match err.kind() {
        ErrorKind::Utf8 { .. } => "invalid UTF-8".to_string(),
        ErrorKind::Deserialize { err, .. } => match err.kind() {
            DeserializeErrorKind::InvalidUtf8(_) => "invalid UTF-8".to_string(),
            _ => err.to_string(),
        },
        _ => err.to_string(),
    }
}

/// Stateful record parser. The first non-blank record is the header unless
/// the parser was built with [`RecordParser::headerless`].
#[derive(Debug, Clone)]
pub struct RecordParser {
    config: IngestConfig,
    layout: Layout,
    line_no: u64,
    stats: ParseStats,
}

impl RecordParser {
    /// Create a parser expecting a header line.
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            layout: Layout::Pending,
            line_no: 0,
            stats: ParseStats::default(),
        }
    }

    /// Create a parser for headerless `timestamp,symbol,price,quantity` lines.
    pub fn headerless(config: IngestConfig) -> Self {
        Self {
            layout: Layout::Positional,
            ..Self::new(config)
        }
    }

    /// Resolve column names from a header record.
    fn parse_header(&mut self, record: &ByteRecord) -> Result<()> {
        let mut names = ByteRecord::new();
        for field in record {
            let name = std::str::from_utf8(field)
                .map_err(|_| Error::malformed("header is not valid UTF-8"))?;
            names.push_field(name.trim().to_ascii_lowercase().as_bytes());
        }
        if let Some(missing) = COLUMNS
            .iter()
            .find(|column| !names.iter().any(|name| name == column.as_bytes()))
        {
            return Err(Error::malformed(format!("header missing column '{missing}'")));
        }
        self.layout = Layout::Named(names);
        Ok(())
    }

    /// Parse one line of text.
    ///
    /// Returns `Ok(None)` for blank lines and for the header.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Tick>> {
        self.line_no += 1;
        let mut record = ByteRecord::new();
        match csv_reader(line.as_bytes()).read_byte_record(&mut record) {
            Ok(true) => self.parse_record(&mut record, self.line_no),
            Ok(false) => Ok(None),
            Err(e) => Err(self.reject(self.line_no, describe(&e))),
        }
    }

    /// Parse one CSV record that started on line `line_no`.
    fn parse_record(&mut self, record: &mut ByteRecord, line_no: u64) -> Result<Option<Tick>> {
        record.trim();
        if record.iter().all(|field| field.is_empty()) {
            return Ok(None);
        }

        if let Layout::Pending = self.layout {
            self.parse_header(record)?;
            return Ok(None);
        }

        self.stats.lines += 1;
        match self.parse_trade(record) {
            Ok(tick) => {
                self.stats.ticks += 1;
                Ok(Some(tick))
            }
            Err(e) => {
                let detail = match e {
                    Error::MalformedInput(msg) => msg,
                    other => other.to_string(),
                };
                Err(self.reject(line_no, detail))
            }
        }
    }

    fn reject(&mut self, line_no: u64, detail: String) -> Error {
        self.stats.malformed += 1;
        Error::malformed(format!("line {line_no}: {detail}"))
    }

    fn parse_trade(&self, record: &ByteRecord) -> Result<Tick> {
        let headers = match &self.layout {
            Layout::Named(names) => Some(names),
            _ => None,
        };
        let row: TradeRecord = record
            .deserialize(headers)
            .map_err(|e| Error::malformed(describe(&e)))?;

        let ts_ms = self.parse_timestamp(&row.timestamp)?;
        let tick = Tick::new(ts_ms, row.symbol, row.price, row.quantity);
        tick.validate()?;
        Ok(tick)
    }

    /// Parse a timestamp: configured naive UTC format, then RFC 3339, then
    /// integer epoch milliseconds.
    pub fn parse_timestamp(&self, raw: &str) -> Result<TimestampMs> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, &self.config.timestamp_format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.timestamp_millis());
        }
        raw.parse::<i64>()
            .map_err(|_| Error::malformed(format!("unparseable timestamp '{raw}'")))
    }

    /// Iterate over the ticks of a reader, skipping the header and blank
    /// lines.
    pub fn parse_reader<R: Read>(self, reader: R) -> TickReader<R> {
        TickReader {
            parser: self,
            reader: csv_reader(reader),
            record: ByteRecord::new(),
        }
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }
}

/// Iterator of parsed ticks over a CSV stream.
///
/// Undecodable records come out as [`Error::MalformedInput`] and iteration
/// continues; a failure of the underlying reader comes out as
/// [`Error::Io`].
pub struct TickReader<R> {
    parser: RecordParser,
    reader: csv::Reader<R>,
    record: ByteRecord,
}

impl<R> TickReader<R> {
    pub fn stats(&self) -> &ParseStats {
        self.parser.stats()
    }

    pub fn into_parser(self) -> RecordParser {
        self.parser
    }
}

impl<R: Read> Iterator for TickReader<R> {
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    return Some(Err(match e.into_kind() {
                        ErrorKind::Io(io) => Error::Io(io),
                        kind => {
                            let line_no = self.reader.position().line();
                            self.parser.reject(line_no, format!("{kind:?}"))
                        }
                    }))
                }
            }
            let line_no = self.record.position().map_or(0, |p| p.line());
            match self.parser.parse_record(&mut self.record, line_no) {
                Ok(Some(tick)) => return Some(Ok(tick)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io;

    const T: i64 = 1_704_067_200_000; // 2024-01-01 00:00:00 UTC

    fn parser() -> RecordParser {
        RecordParser::new(IngestConfig::default())
    }

    #[test]
    fn test_header_then_record() {
        let mut p = parser();
        assert_eq!(p.parse_line("timestamp,symbol,price,quantity").unwrap(), None);

        let tick = p
            .parse_line("2024-01-01T00:01:30Z,AAPL,187.25,100")
            .unwrap()
            .unwrap();
        assert_eq!(tick.ts_ms, T + 90_000);
        assert_eq!(tick.symbol, "AAPL");
        assert_relative_eq!(tick.price, 187.25);
        assert_relative_eq!(tick.quantity, 100.0);
        assert_eq!(p.stats().ticks, 1);
    }

    #[test]
    fn test_column_order_from_header() {
        let mut p = parser();
        p.parse_line("\"symbol\",quantity,exchange,price,timestamp").unwrap();

        let tick = p
            .parse_line("MSFT,5,XNAS,410.5,2024-01-01T00:00:00Z")
            .unwrap()
            .unwrap();
        assert_eq!(tick.symbol, "MSFT");
        assert_relative_eq!(tick.price, 410.5);
        assert_relative_eq!(tick.quantity, 5.0);
        assert_eq!(tick.ts_ms, T);
    }

    #[test]
    fn test_missing_header_column() {
        let mut p = parser();
        let err = p.parse_line("timestamp,symbol,price").unwrap_err();
        assert!(matches!(err, Error::MalformedInput(ref msg) if msg.contains("quantity")));
    }

    #[test]
    fn test_timestamp_formats() {
        let p = parser();
        assert_eq!(p.parse_timestamp("2024-01-01T00:00:00Z").unwrap(), T);
        assert_eq!(p.parse_timestamp("2024-01-01T01:00:00+01:00").unwrap(), T);
        assert_eq!(p.parse_timestamp("1704067200000").unwrap(), T);
        assert!(p.parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_malformed_lines_are_counted() {
        let mut p = RecordParser::headerless(IngestConfig::default());

        assert!(p.parse_line("2024-01-01T00:00:00Z,AAPL,abc,1").is_err());
        assert!(p.parse_line("2024-01-01T00:00:00Z,AAPL,100").is_err());
        assert!(p.parse_line("2024-01-01T00:00:00Z,AAPL,100,0").is_err());
        assert!(p.parse_line("2024-01-01T00:00:00Z,AAPL,100,2").unwrap().is_some());
        assert_eq!(p.parse_line("   ").unwrap(), None);

        let stats = p.stats();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.malformed, 3);
        assert_eq!(stats.ticks, 1);
        assert_relative_eq!(stats.malformed_frac(), 0.75);
    }

    #[test]
    fn test_error_carries_line_number() {
        let mut p = parser();
        p.parse_line("timestamp,symbol,price,quantity").unwrap();
        p.parse_line("").unwrap();
        let err = p.parse_line("nope,AAPL,1,1").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_reader() {
        let data = "timestamp,symbol,price,quantity\n\
                    2024-01-01T00:00:00Z,AAPL,100,10\n\
                    \n\
                    garbage\n\
                    2024-01-01T00:06:00Z,AAPL,110,5\n";

        let mut reader = parser().parse_reader(data.as_bytes());
        let results: Vec<Result<Tick>> = reader.by_ref().collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().ts_ms, T + 360_000);
        assert_eq!(reader.stats().malformed, 1);
    }

    #[test]
    fn test_quoted_field_with_comma() {
        let data = "note,timestamp,symbol,price,quantity\n\
                    \"odd, lot\",2024-01-01T00:00:00Z,AAPL,100,10\n";

        let mut reader = parser().parse_reader(data.as_bytes());
        let tick = reader.next().unwrap().unwrap();
        assert_eq!(tick.symbol, "AAPL");
        assert_eq!(tick.ts_ms, T);
        assert_relative_eq!(tick.quantity, 10.0);
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().malformed, 0);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut data = b"timestamp,symbol,price,quantity\n".to_vec();
        data.extend_from_slice(b"2024-01-01T00:00:00Z,AAPL,100,10\n");
        data.extend_from_slice(b"2024-01-01T00:00:30Z,AA\xffPL,100,10\n");
        data.extend_from_slice(b"2024-01-01T00:01:00Z,AAPL,101,10\n");

        let mut reader = parser().parse_reader(data.as_slice());
        let results: Vec<Result<Tick>> = reader.by_ref().collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(Error::MalformedInput(msg)) if msg == "line 3: invalid UTF-8"
        ));
        assert_eq!(results[2].as_ref().unwrap().ts_ms, T + 60_000);
        assert_eq!(reader.stats().malformed, 1);
    }

    /// Yields `data` once, then fails.
    struct FailingReader {
        data: &'static [u8],
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            self.served = true;
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_reader_failure_is_io_error() {
        let source = FailingReader {
            data: b"timestamp,symbol,price,quantity\n2024-01-01T00:00:00Z,AAPL,100,10\n",
            served: false,
        };

        let mut reader = parser().parse_reader(source);
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(reader.next().unwrap(), Err(Error::Io(_))));
        assert_eq!(reader.stats().malformed, 0);
    }
}
