//! Dataset manifest: what went into a processed version and what came out.
//!
//! The manifest carries no wall-clock time, so reruns on identical input
//! produce an identical file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use stockcast_core::{GridStats, SymbolError};

/// Current schema version for persisted manifests.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Per-symbol counts for a processed version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolManifest {
    pub symbol: String,
    pub source: PathBuf,
    pub source_hash: String,
    pub feature_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub grid: GridStats,
}

/// A symbol that was excluded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub kind: String,
    pub message: String,
}

impl From<&SymbolError> for SymbolFailure {
    fn from(err: &SymbolError) -> Self {
        Self {
            symbol: err.symbol().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub version: String,
    /// Hash of the options that shape the dataset.
    pub config_hash: String,
    /// BLAKE3 of the processed CSV bytes.
    pub dataset_hash: String,
    pub columns: Vec<String>,
    pub rolling_window_size: usize,
    pub label_horizon_minutes: u32,
    pub train_fraction: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub symbols: Vec<SymbolManifest>,
    pub failures: Vec<SymbolFailure>,
}

impl DatasetManifest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize dataset manifest")
    }

    /// Parse a manifest, rejecting schema versions newer than this build.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(json).context("failed to deserialize dataset manifest")?;
        if manifest.schema_version > SCHEMA_VERSION {
            bail!(
                "unsupported manifest schema version {} (max supported: {})",
                manifest.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn total_rows(&self) -> usize {
        self.train_rows + self.test_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_core::DataIntegrityError;

    fn sample() -> DatasetManifest {
        DatasetManifest {
            schema_version: SCHEMA_VERSION,
            version: "v0".into(),
            config_hash: "c0ffee".into(),
            dataset_hash: "abc123".into(),
            columns: vec!["symbol".into(), "timestamp".into()],
            rolling_window_size: 10,
            label_horizon_minutes: 5,
            train_fraction: 0.8,
            train_rows: 8,
            test_rows: 2,
            symbols: vec![SymbolManifest {
                symbol: "AARTIIND".into(),
                source: PathBuf::from("data/v0/AARTIIND__EQ__NSE__NSE__MINUTE.csv"),
                source_hash: "def456".into(),
                feature_rows: 10,
                train_rows: 8,
                test_rows: 2,
                grid: GridStats::default(),
            }],
            failures: vec![],
        }
    }

    #[test]
    fn json_roundtrip() {
        let m = sample();
        let back = DatasetManifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.total_rows(), 10);
    }

    #[test]
    fn rejects_newer_schema_version() {
        let mut m = sample();
        m.schema_version = SCHEMA_VERSION + 1;
        let err = DatasetManifest::from_json(&m.to_json().unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported manifest schema version"));
    }

    #[test]
    fn failure_from_symbol_error() {
        let err = SymbolError::from(DataIntegrityError::Empty {
            symbol: "ABFRL".into(),
        });
        let f = SymbolFailure::from(&err);
        assert_eq!(f.symbol, "ABFRL");
        assert_eq!(f.kind, "data_integrity");
        assert!(f.message.contains("no raw ticks"));
    }
}
