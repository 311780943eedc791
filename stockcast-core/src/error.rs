//! Error taxonomy for the pipeline.
//!
//! - `DataIntegrityError`: a symbol's raw input is malformed, empty, or unsortable.
//!   Fatal for that symbol, always surfaced to the caller.
//! - `InsufficientDataError`: a symbol produced no usable rows after filtering.
//!   Fatal for that symbol; other symbols may continue.
//! - `ConfigError`: a recognized option is missing or invalid. Raised before
//!   any symbol is processed.
//!
//! Row-dropping policies (unfillable session openings, windows crossing a
//! session boundary, end-of-session label tails) are not errors; they only
//! show up in row counts.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed, empty, or unsortable raw input for one symbol.
#[derive(Debug, Error)]
pub enum DataIntegrityError {
    #[error("{symbol}: no raw ticks")]
    Empty { symbol: String },

    #[error("{symbol}: failed to read {}: {source}", path.display())]
    Io {
        symbol: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{symbol}: CSV error: {source}")]
    Csv {
        symbol: String,
        #[source]
        source: csv::Error,
    },

    #[error("{symbol}: line {line}: {reason}")]
    Malformed {
        symbol: String,
        line: u64,
        reason: String,
    },

    #[error("{symbol}: line {line}: timestamp {timestamp} is not on a minute boundary")]
    UnalignedTimestamp {
        symbol: String,
        line: u64,
        timestamp: NaiveDateTime,
    },

    #[error("{symbol}: conflicting duplicate ticks at {timestamp}")]
    ConflictingDuplicate {
        symbol: String,
        timestamp: NaiveDateTime,
    },
}

impl DataIntegrityError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Empty { symbol }
            | Self::Io { symbol, .. }
            | Self::Csv { symbol, .. }
            | Self::Malformed { symbol, .. }
            | Self::UnalignedTimestamp { symbol, .. }
            | Self::ConflictingDuplicate { symbol, .. } => symbol,
        }
    }
}

/// A symbol yielded zero valid feature rows after every filtering stage.
#[derive(Debug, Clone, Error)]
#[error(
    "{symbol}: no usable rows ({raw_ticks} raw ticks, {grid_rows} grid rows, {feature_rows} feature rows)"
)]
pub struct InsufficientDataError {
    pub symbol: String,
    pub raw_ticks: usize,
    pub grid_rows: usize,
    pub feature_rows: usize,
}

/// Missing or invalid configuration option.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },

    #[error("missing required option: {0}")]
    Missing(String),

    #[error("unknown pipeline version '{0}'")]
    UnknownVersion(String),
}

impl ConfigError {
    pub fn invalid(option: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            option,
            reason: reason.into(),
        }
    }
}

/// Everything that can stop a single symbol's pipeline.
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("data integrity: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("insufficient data: {0}")]
    InsufficientData(#[from] InsufficientDataError),
}

impl SymbolError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::DataIntegrity(e) => e.symbol(),
            Self::InsufficientData(e) => &e.symbol,
        }
    }

    /// Short machine-readable kind, used in manifests and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataIntegrity(_) => "data_integrity",
            Self::InsufficientData(_) => "insufficient_data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_error_reports_symbol_and_kind() {
        let err: SymbolError = DataIntegrityError::Empty {
            symbol: "ABFRL".into(),
        }
        .into();
        assert_eq!(err.symbol(), "ABFRL");
        assert_eq!(err.kind(), "data_integrity");

        let err: SymbolError = InsufficientDataError {
            symbol: "ADANIENT".into(),
            raw_ticks: 3,
            grid_rows: 3,
            feature_rows: 0,
        }
        .into();
        assert_eq!(err.symbol(), "ADANIENT");
        assert_eq!(err.kind(), "insufficient_data");
        assert!(err.to_string().contains("3 raw ticks"));
    }

    #[test]
    fn config_error_invalid_message() {
        let err = ConfigError::invalid("train_fraction", "must be in (0, 1), got 1.5");
        assert_eq!(
            err.to_string(),
            "invalid value for train_fraction: must be in (0, 1), got 1.5"
        );
    }
}
