//! Model trainer: random forest on the processed dataset's feature columns.
//!
//! Consumes `processed_vN.csv` exactly as written by preprocessing, using the
//! `split` column as-is. Produces `metrics_vN.json`, the fitted model as
//! `model_vN.json`, and one experiment history entry.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use thiserror::Error;
use tracing::info;

use stockcast_core::data::DatasetSchema;
use stockcast_core::fingerprint::hash_file;
use stockcast_core::{Dataset, FeatureRow, Split};

use crate::config::{normalize_version, PipelineConfig, TrainerConfig};
use crate::export::{read_dataset_csv, write_atomic, write_json_atomic};
use crate::history::{ExperimentEntry, ExperimentHistory};
use crate::manifest::DatasetManifest;
use crate::metrics::{accuracy, ClassReport, ClassificationMetrics, ConfusionMatrix};

type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("failed to load processed dataset: {0:#}")]
    Load(anyhow::Error),
    #[error("processed dataset does not match its manifest (expected {expected}, found {found})")]
    StaleDataset { expected: String, found: String },
    #[error("{} partition is empty", .0.as_str())]
    EmptyPartition(Split),
    #[error("train partition has a single class (label {label})")]
    SingleClass { label: u8 },
    #[error("model error: {0}")]
    Model(String),
    #[error("failed to write training artifacts: {0:#}")]
    Export(anyhow::Error),
}

/// Metrics written to `metrics_vN.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub version: String,
    pub dataset_hash: String,
    pub params: TrainerConfig,
    pub train_rows: usize,
    pub test_rows: usize,
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub classes: Vec<ClassReport>,
    /// Accuracy lost when the column is shuffled, keyed by column name.
    pub feature_importance: BTreeMap<String, f64>,
}

/// Scores from evaluating a fitted model on the test partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: ClassificationMetrics,
    pub feature_importance: BTreeMap<String, f64>,
}

/// A fitted forest and the column names it was trained on.
pub struct TrainedModel {
    forest: Forest,
    feature_names: [String; 2],
    seed: u64,
}

impl TrainedModel {
    pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<u32>, TrainError> {
        self.predict_matrix(&feature_matrix(rows))
    }

    fn predict_matrix(&self, x: &[Vec<f64>]) -> Result<Vec<u32>, TrainError> {
        let m = DenseMatrix::from_2d_vec(&x.to_vec())
            .map_err(|e| TrainError::Model(format!("matrix creation failed: {e}")))?;
        self.forest
            .predict(&m)
            .map_err(|e| TrainError::Model(format!("prediction failed: {e}")))
    }

    /// Accuracy, confusion matrix, per-class scores and permutation importance on `rows`.
    pub fn evaluate(&self, rows: &[FeatureRow]) -> Result<Evaluation, TrainError> {
        let x = feature_matrix(rows);
        let y = label_vector(rows);
        let predicted = self.predict_matrix(&x)?;
        let metrics = ClassificationMetrics::compute(&y, &predicted);

        let mut feature_importance = BTreeMap::new();
        for (col, name) in self.feature_names.iter().enumerate() {
            let mut shuffled = x.clone();
            let mut column: Vec<f64> = shuffled.iter().map(|r| r[col]).collect();
            column.shuffle(&mut StdRng::seed_from_u64(importance_seed(self.seed, name)));
            for (row, value) in shuffled.iter_mut().zip(column) {
                row[col] = value;
            }
            let permuted = accuracy(&y, &self.predict_matrix(&shuffled)?);
            feature_importance.insert(name.clone(), metrics.accuracy - permuted);
        }

        Ok(Evaluation {
            metrics,
            feature_importance,
        })
    }

    /// The forest as JSON, loadable with `serde_json`.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(&self.forest).context("failed to serialize model")
    }
}

/// Fits a random forest classifier with fixed hyperparameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelTrainer {
    params: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(params: TrainerConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainerConfig {
        &self.params
    }

    /// Fit on the train partition of `dataset`.
    pub fn fit(&self, dataset: &Dataset, schema: &DatasetSchema) -> Result<TrainedModel, TrainError> {
        if dataset.train.is_empty() {
            return Err(TrainError::EmptyPartition(Split::Train));
        }
        if dataset.test.is_empty() {
            return Err(TrainError::EmptyPartition(Split::Test));
        }
        let first = dataset.train[0].label;
        if dataset.train.iter().all(|r| r.label == first) {
            return Err(TrainError::SingleClass { label: first });
        }

        let x = DenseMatrix::from_2d_vec(&feature_matrix(&dataset.train))
            .map_err(|e| TrainError::Model(format!("matrix creation failed: {e}")))?;
        let y = label_vector(&dataset.train);

        let p = &self.params;
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(p.n_trees.into())
            .with_max_depth(p.max_depth)
            .with_min_samples_split(p.min_samples_split)
            .with_min_samples_leaf(p.min_samples_leaf)
            .with_seed(p.seed);

        let forest = RandomForestClassifier::fit(&x, &y, params)
            .map_err(|e| TrainError::Model(format!("training failed: {e}")))?;

        info!(
            train_rows = dataset.train.len(),
            n_trees = p.n_trees,
            max_depth = p.max_depth,
            "fitted random forest"
        );

        Ok(TrainedModel {
            forest,
            feature_names: schema.feature_columns(),
            seed: p.seed,
        })
    }
}

/// Result of [`train_version`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub metrics_path: PathBuf,
    pub model_path: PathBuf,
    pub entry: ExperimentEntry,
}

/// Train on a preprocessed version, write its metrics and model, and record
/// the run in the experiment history.
pub fn train_version(config: &PipelineConfig, version: &str) -> Result<TrainingOutcome, TrainError> {
    let version = normalize_version(version);
    let schema = config.schema();
    let csv_path = config.processed_csv_path(&version);

    let manifest =
        DatasetManifest::load(&config.manifest_path(&version)).map_err(TrainError::Load)?;
    let found = hash_file(&csv_path)
        .map_err(|e| TrainError::Load(anyhow::anyhow!("{}: {e}", csv_path.display())))?;
    if found != manifest.dataset_hash {
        return Err(TrainError::StaleDataset {
            expected: manifest.dataset_hash,
            found,
        });
    }
    let dataset = read_dataset_csv(&csv_path, &schema).map_err(TrainError::Load)?;

    let trainer = ModelTrainer::new(config.trainer);
    let model = trainer.fit(&dataset, &schema)?;
    let eval = model.evaluate(&dataset.test)?;

    let report = TrainingReport {
        version: version.clone(),
        dataset_hash: manifest.dataset_hash,
        params: config.trainer,
        train_rows: dataset.train.len(),
        test_rows: dataset.test.len(),
        accuracy: eval.metrics.accuracy,
        confusion_matrix: eval.metrics.confusion_matrix,
        classes: eval.metrics.classes,
        feature_importance: eval.feature_importance,
    };

    let metrics_path = config.metrics_path(&version);
    let model_path = config.model_path(&version);
    write_json_atomic(&metrics_path, &report).map_err(TrainError::Export)?;
    let model_json = model.to_json().map_err(TrainError::Export)?;
    write_atomic(&model_path, model_json.as_bytes()).map_err(TrainError::Export)?;

    let entry = ExperimentEntry::from_report(&report);
    ExperimentHistory::new(config.output.history.clone())
        .append(&entry)
        .map_err(|e| TrainError::Export(e.into()))?;

    info!(
        version = %version,
        accuracy = report.accuracy,
        test_rows = report.test_rows,
        run_id = %entry.run_id,
        "trained model"
    );

    Ok(TrainingOutcome {
        report,
        metrics_path,
        model_path,
        entry,
    })
}

fn feature_matrix(rows: &[FeatureRow]) -> Vec<Vec<f64>> {
    rows.iter().map(|r| vec![r.rolling_avg, r.volume_sum]).collect()
}

fn label_vector(rows: &[FeatureRow]) -> Vec<u32> {
    rows.iter().map(|r| u32::from(r.label)).collect()
}

/// Per-column shuffle seed, independent of column order.
fn importance_seed(seed: u64, column: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(column.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
