//! Dataset assembly: per-symbol feature rows → chronological train/test split.
//!
//! Each symbol's rows are split by position (first `floor(n * fraction)` rows
//! train, the rest test), then all train partitions are concatenated followed
//! by all test partitions, in the order symbols were supplied. Rows are never
//! re-sorted across symbols.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureRow, Split};
use crate::error::{ConfigError, InsufficientDataError};
use crate::features::FeatureEngine;
use crate::grid::GapFilledSeries;
use crate::labels::LabelGenerator;

/// Feature rows for one symbol with the row counts seen upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRows {
    pub symbol: String,
    pub raw_ticks: usize,
    pub grid_rows: usize,
    pub rows: Vec<FeatureRow>,
}

impl SymbolRows {
    /// Join features and labels over a gap-filled series, keeping only rows
    /// where both exist.
    pub fn from_series(
        series: &GapFilledSeries,
        engine: &FeatureEngine,
        labels: &LabelGenerator,
    ) -> Self {
        let features = engine.compute(&series.ticks);
        let targets = labels.compute(&series.ticks);

        let rows = series
            .ticks
            .iter()
            .zip(features)
            .zip(targets)
            .filter_map(|((tick, stats), label)| {
                let stats = stats?;
                Some(FeatureRow {
                    symbol: series.symbol.clone(),
                    timestamp: tick.timestamp,
                    rolling_avg: stats.rolling_avg,
                    volume_sum: stats.volume_sum,
                    label: label?,
                })
            })
            .collect();

        Self {
            symbol: series.symbol.clone(),
            raw_ticks: series.stats.raw_ticks,
            grid_rows: series.len(),
            rows,
        }
    }

    fn insufficient(&self) -> InsufficientDataError {
        InsufficientDataError {
            symbol: self.symbol.clone(),
            raw_ticks: self.raw_ticks,
            grid_rows: self.grid_rows,
            feature_rows: self.rows.len(),
        }
    }

    /// Fail when filtering left nothing usable.
    pub fn ensure_usable(self) -> Result<Self, InsufficientDataError> {
        if self.rows.is_empty() {
            return Err(self.insufficient());
        }
        Ok(self)
    }
}

/// Per-symbol partition sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub symbol: String,
    pub train: usize,
    pub test: usize,
}

/// The assembled, split dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
    pub partitions: Vec<PartitionSummary>,
}

impl Dataset {
    /// All rows in output order: every train row, then every test row.
    pub fn rows(&self) -> impl Iterator<Item = (&FeatureRow, Split)> + '_ {
        self.train
            .iter()
            .map(|r| (r, Split::Train))
            .chain(self.test.iter().map(|r| (r, Split::Test)))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetAssembler {
    train_fraction: f64,
}

impl DatasetAssembler {
    pub fn new(train_fraction: f64) -> Result<Self, ConfigError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(ConfigError::invalid(
                "train_fraction",
                format!("{train_fraction} is not in (0, 1)"),
            ));
        }
        Ok(Self { train_fraction })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Number of leading rows that go to train for a symbol with `n` rows.
    pub fn train_len(&self, n: usize) -> usize {
        // The epsilon keeps exact products such as 10 * 0.8 from rounding down.
        let k = (n as f64 * self.train_fraction + 1e-9).floor() as usize;
        k.min(n)
    }

    /// Split every symbol and concatenate, failing on the first symbol with
    /// no rows.
    pub fn assemble(&self, symbols: Vec<SymbolRows>) -> Result<Dataset, InsufficientDataError> {
        let mut dataset = Dataset::default();

        for symbol in symbols {
            let mut symbol = symbol.ensure_usable()?;
            let k = self.train_len(symbol.rows.len());
            let test = symbol.rows.split_off(k);

            dataset.partitions.push(PartitionSummary {
                symbol: symbol.symbol,
                train: symbol.rows.len(),
                test: test.len(),
            });
            dataset.train.extend(symbol.rows);
            dataset.test.extend(test);
        }

        Ok(dataset)
    }
}

impl Default for DatasetAssembler {
    fn default() -> Self {
        Self { train_fraction: 0.8 }
    }
}
