//! Artifact export: processed CSV and Parquet, feature-view descriptor, and
//! the reader the trainer uses to load a processed CSV back.
//!
//! Every file is written to a `.tmp` sibling first and renamed into place, so
//! a crashed run never leaves a half-written artifact under the final name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use stockcast_core::data::DatasetSchema;
use stockcast_core::{Dataset, FeatureRow, PartitionSummary, Split};

/// Timestamp layout used in the processed CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── CSV ────────────────────────────────────────────────────────────

/// Render the dataset as CSV bytes: train rows of every symbol, then test rows.
///
/// Floats use Rust's shortest round-trip form, so the same dataset always
/// renders to the same bytes.
pub fn dataset_csv(dataset: &Dataset, schema: &DatasetSchema) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(schema.column_names())?;

    for (row, split) in dataset.rows() {
        let timestamp = row.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let rolling_avg = row.rolling_avg.to_string();
        let volume_sum = row.volume_sum.to_string();
        let label = row.label.to_string();
        wtr.write_record([
            row.symbol.as_str(),
            timestamp.as_str(),
            rolling_avg.as_str(),
            volume_sum.as_str(),
            label.as_str(),
            split.as_str(),
        ])?;
    }

    wtr.into_inner().context("failed to flush CSV writer")
}

/// Load a processed CSV written by [`dataset_csv`].
///
/// The header must match `schema` exactly. Partition summaries are rebuilt
/// from the rows in first-seen symbol order.
pub fn read_dataset_csv(path: &Path, schema: &DatasetSchema) -> Result<Dataset> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if header != schema.column_names() {
        bail!(
            "{}: unexpected header {:?}, expected {:?}",
            path.display(),
            header,
            schema.column_names()
        );
    }

    let mut dataset = Dataset::default();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let timestamp = NaiveDateTime::parse_from_str(field(1), TIMESTAMP_FORMAT)
            .with_context(|| format!("line {line}: bad timestamp '{}'", field(1)))?;
        let rolling_avg: f64 = field(2)
            .parse()
            .with_context(|| format!("line {line}: bad rolling average '{}'", field(2)))?;
        let volume_sum: f64 = field(3)
            .parse()
            .with_context(|| format!("line {line}: bad volume sum '{}'", field(3)))?;
        let label: u8 = field(4)
            .parse()
            .with_context(|| format!("line {line}: bad label '{}'", field(4)))?;
        if label > 1 {
            bail!("line {line}: label {label} is not 0 or 1");
        }
        let split = Split::parse(field(5))
            .with_context(|| format!("line {line}: bad split '{}'", field(5)))?;

        let row = FeatureRow {
            symbol: field(0).to_string(),
            timestamp,
            rolling_avg,
            volume_sum,
            label,
        };

        let idx = match dataset.partitions.iter().position(|p| p.symbol == row.symbol) {
            Some(idx) => idx,
            None => {
                dataset.partitions.push(PartitionSummary {
                    symbol: row.symbol.clone(),
                    train: 0,
                    test: 0,
                });
                dataset.partitions.len() - 1
            }
        };
        match split {
            Split::Train => {
                dataset.partitions[idx].train += 1;
                dataset.train.push(row);
            }
            Split::Test => {
                dataset.partitions[idx].test += 1;
                dataset.test.push(row);
            }
        }
    }

    Ok(dataset)
}

// ─── Parquet ────────────────────────────────────────────────────────

/// Write the dataset as Parquet at `path`, atomically.
pub fn write_parquet(dataset: &Dataset, schema: &DatasetSchema, path: &Path) -> Result<()> {
    let mut df = schema
        .to_dataframe(dataset)
        .context("failed to build dataset DataFrame")?;
    schema.validate(&df)?;

    write_atomic_with(path, |file| {
        ParquetWriter::new(file).finish(&mut df)?;
        Ok(())
    })
}

// ─── Feature view ───────────────────────────────────────────────────

/// Feature-store declaration for a processed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureView {
    pub name: String,
    pub entities: Vec<String>,
    pub timestamp_field: String,
    pub ttl_seconds: u64,
    pub fields: Vec<FeatureField>,
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureField {
    pub name: String,
    pub dtype: String,
}

impl FeatureView {
    /// Entity `symbol`, one-day TTL, feature and label columns of `schema`.
    pub fn for_version(version: &str, schema: &DatasetSchema, source: &Path) -> Self {
        let field = |name: String, dtype: &str| FeatureField {
            name,
            dtype: dtype.to_string(),
        };
        Self {
            name: format!("stock_features_{version}"),
            entities: vec!["symbol".to_string()],
            timestamp_field: "timestamp".to_string(),
            ttl_seconds: 86_400,
            fields: vec![
                field(schema.rolling_avg_column(), "Float64"),
                field(schema.volume_sum_column(), "Float64"),
                field("label".to_string(), "Int64"),
            ],
            source: source.to_path_buf(),
        }
    }
}

// ─── Atomic writes ──────────────────────────────────────────────────

/// `processed_v0.csv` → `processed_v0.csv.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a `.tmp` sibling and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |file| {
        file.write_all(bytes)?;
        Ok(())
    })
}

/// Let `write` fill a `.tmp` sibling of `path`, then rename it into place.
///
/// The temp file is removed if `write` or the rename fails.
pub fn write_atomic_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    let mut file =
        fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    if let Err(e) = write(&mut file).and_then(|()| file.sync_all().map_err(Into::into)) {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(e.context(format!("failed to write {}", tmp.display())));
    }
    drop(file);
    rename_into_place(&tmp, path)
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    write_atomic(path, json.as_bytes())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn rename_into_place(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path).map_err(|e| {
        // Clean up temp file on rename failure
        let _ = fs::remove_file(tmp);
        anyhow::anyhow!("atomic rename to {} failed: {e}", path.display())
    })
}
