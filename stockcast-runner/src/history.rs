//! Experiment history: JSONL append-only log of training runs.
//!
//! One JSON object per line, so a partial write only loses the last line and
//! the file can be streamed. Readers skip lines they cannot parse.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use stockcast_core::fingerprint::hash_json;

use crate::config::TrainerConfig;
use crate::trainer::TrainingReport;

/// Summary metrics stored with each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_importance: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEntry {
    /// BLAKE3 of version, dataset hash and params. Retraining the same data
    /// with the same params gives the same id.
    pub run_id: String,
    pub timestamp: NaiveDateTime,
    pub version: String,
    pub dataset_hash: String,
    pub params: TrainerConfig,
    pub metrics: RunMetrics,
}

#[derive(Serialize)]
struct RunKey<'a> {
    version: &'a str,
    dataset_hash: &'a str,
    params: &'a TrainerConfig,
}

/// Deterministic id for a (version, dataset, params) triple.
pub fn run_id(version: &str, dataset_hash: &str, params: &TrainerConfig) -> String {
    let key = RunKey {
        version,
        dataset_hash,
        params,
    };
    // Plain structs with string and integer fields always serialize.
    hash_json(&key).unwrap_or_else(|_| format!("{version}-{dataset_hash}"))
}

impl ExperimentEntry {
    /// Entry for a finished training run, stamped with the current UTC time.
    pub fn from_report(report: &TrainingReport) -> Self {
        Self {
            run_id: run_id(&report.version, &report.dataset_hash, &report.params),
            timestamp: chrono::Utc::now().naive_utc(),
            version: report.version.clone(),
            dataset_hash: report.dataset_hash.clone(),
            params: report.params,
            metrics: RunMetrics {
                accuracy: report.accuracy,
                train_rows: report.train_rows,
                test_rows: report.test_rows,
                feature_importance: report.feature_importance.clone(),
            },
        }
    }
}

/// JSONL history file manager.
pub struct ExperimentHistory {
    path: PathBuf,
}

impl ExperimentHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &ExperimentEntry) -> io::Result<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()
    }

    /// All entries in file order. A missing file is an empty history.
    pub fn read_all(&self) -> io::Result<Vec<ExperimentEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExperimentEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::debug!(error = %e, "skipping malformed history line"),
            }
        }
        Ok(entries)
    }

    /// Entries for `version` only, in file order.
    pub fn for_version(&self, version: &str) -> io::Result<Vec<ExperimentEntry>> {
        let mut entries = self.read_all()?;
        entries.retain(|e| e.version == version);
        Ok(entries)
    }

    /// The most recently appended entry for `version`.
    pub fn latest_for_version(&self, version: &str) -> io::Result<Option<ExperimentEntry>> {
        Ok(self.for_version(version)?.pop())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(version: &str, accuracy: f64) -> ExperimentEntry {
        let params = TrainerConfig::default();
        ExperimentEntry {
            run_id: run_id(version, "abc", &params),
            timestamp: chrono::Utc::now().naive_utc(),
            version: version.into(),
            dataset_hash: "abc".into(),
            params,
            metrics: RunMetrics {
                accuracy,
                train_rows: 80,
                test_rows: 20,
                feature_importance: BTreeMap::from([("rolling_avg_10".to_string(), 0.1)]),
            },
        }
    }

    #[test]
    fn append_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let history = ExperimentHistory::new(tmp.path().join("nested/experiments.jsonl"));

        let e = entry("v0", 0.55);
        history.append(&e).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries, vec![e]);
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let history = ExperimentHistory::new(tmp.path().join("none.jsonl"));
        assert!(history.read_all().unwrap().is_empty());
        assert!(history.latest_for_version("v0").unwrap().is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("experiments.jsonl");
        let history = ExperimentHistory::new(path.clone());

        history.append(&entry("v0", 0.5)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"run_id\": truncated").unwrap();
        writeln!(file).unwrap();
        history.append(&entry("v1", 0.6)).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].version, "v1");
    }

    #[test]
    fn latest_for_version_picks_last_appended() {
        let tmp = TempDir::new().unwrap();
        let history = ExperimentHistory::new(tmp.path().join("experiments.jsonl"));
        history.append(&entry("v0", 0.50)).unwrap();
        history.append(&entry("v1", 0.70)).unwrap();
        history.append(&entry("v0", 0.52)).unwrap();

        let latest = history.latest_for_version("v0").unwrap().unwrap();
        assert!((latest.metrics.accuracy - 0.52).abs() < 1e-12);
        assert_eq!(history.for_version("v1").unwrap().len(), 1);
    }

    #[test]
    fn run_id_depends_on_inputs() {
        let params = TrainerConfig::default();
        let a = run_id("v0", "abc", &params);
        assert_eq!(a, run_id("v0", "abc", &params));
        assert_ne!(a, run_id("v1", "abc", &params));
        assert_ne!(a, run_id("v0", "abd", &params));

        let deeper = TrainerConfig {
            max_depth: 12,
            ..params
        };
        assert_ne!(a, run_id("v0", "abc", &deeper));
    }
}
