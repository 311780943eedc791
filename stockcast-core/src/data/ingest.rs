//! Raw minute-tick ingestion from delimited files.
//!
//! One file per symbol with a header row containing
//! `timestamp,open,high,low,close,volume` (any order, case-insensitive, extra
//! columns ignored). `date` and `datetime` are accepted as aliases for
//! `timestamp`.

use chrono::{DateTime, NaiveDateTime, Timelike};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::RawTick;
use crate::error::DataIntegrityError;

const TIMESTAMP_ALIASES: [&str; 3] = ["timestamp", "date", "datetime"];
const VALUE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z"];

/// Reader for per-symbol raw tick files.
#[derive(Debug, Clone, Copy)]
pub struct DataIngestor;

impl DataIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Read every tick from `path`, in file order.
    pub fn read_file(&self, symbol: &str, path: &Path) -> Result<Vec<RawTick>, DataIntegrityError> {
        let file = File::open(path).map_err(|source| DataIntegrityError::Io {
            symbol: symbol.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        self.read(symbol, file)
    }

    /// Read every tick from any reader, in input order.
    pub fn read<R: Read>(&self, symbol: &str, reader: R) -> Result<Vec<RawTick>, DataIntegrityError> {
        let csv_err = |source| DataIntegrityError::Csv {
            symbol: symbol.to_string(),
            source,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let columns = ColumnMap::from_headers(symbol, rdr.headers().map_err(csv_err)?)?;

        let mut ticks = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            ticks.push(columns.parse(symbol, &record)?);
        }

        if ticks.is_empty() {
            return Err(DataIntegrityError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(ticks)
    }
}

impl Default for DataIngestor {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbol for a source file: the file stem up to the first `__`.
///
/// `data/v0/AARTIIND__EQ__NSE__NSE__MINUTE.csv` → `AARTIIND`.
pub fn symbol_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let symbol = stem.split("__").next().unwrap_or(stem).trim();
    (!symbol.is_empty()).then(|| symbol.to_string())
}

/// Parse a raw timestamp as exchange-local wall time.
///
/// Offsets such as `+05:30` are dropped, not converted: session hours are
/// defined in local time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.naive_local())
        })
}

/// Column positions resolved from the header row.
struct ColumnMap {
    timestamp: usize,
    values: [usize; 5],
}

impl ColumnMap {
    fn from_headers(symbol: &str, headers: &StringRecord) -> Result<Self, DataIntegrityError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let missing = |name: &str| DataIntegrityError::Malformed {
            symbol: symbol.to_string(),
            line: 1,
            reason: format!("missing column '{name}'"),
        };

        let timestamp = TIMESTAMP_ALIASES
            .iter()
            .find_map(|&alias| position(alias))
            .ok_or_else(|| missing("timestamp"))?;

        let mut values = [0usize; 5];
        for (slot, name) in values.iter_mut().zip(VALUE_COLUMNS) {
            *slot = position(name).ok_or_else(|| missing(name))?;
        }

        Ok(Self { timestamp, values })
    }

    fn parse(&self, symbol: &str, record: &StringRecord) -> Result<RawTick, DataIntegrityError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| DataIntegrityError::Malformed {
            symbol: symbol.to_string(),
            line,
            reason,
        };

        let raw_ts = record.get(self.timestamp).unwrap_or("");
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| malformed(format!("bad timestamp '{raw_ts}'")))?;
        if timestamp.second() != 0 || timestamp.nanosecond() != 0 {
            return Err(DataIntegrityError::UnalignedTimestamp {
                symbol: symbol.to_string(),
                line,
                timestamp,
            });
        }

        let mut parsed = [0.0f64; 5];
        for ((value, &idx), name) in parsed.iter_mut().zip(&self.values).zip(VALUE_COLUMNS) {
            let raw = record.get(idx).unwrap_or("");
            *value = raw
                .parse::<f64>()
                .map_err(|_| malformed(format!("{name} '{raw}' is not a number")))?;
            if !value.is_finite() {
                return Err(malformed(format!("{name} '{raw}' is not finite")));
            }
        }
        let [open, high, low, close, volume] = parsed;
        if volume < 0.0 {
            return Err(malformed(format!("negative volume {volume}")));
        }

        Ok(RawTick {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}
