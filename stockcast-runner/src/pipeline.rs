//! Per-version preprocessing: every symbol through grid → features → labels,
//! then assembly and artifact export.
//!
//! Symbols are independent, so they run on the rayon pool. Results are
//! collected in configured order, which keeps the output identical to a
//! sequential run.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use stockcast_core::data::{DataIngestor, DatasetSchema};
use stockcast_core::error::{ConfigError, DataIntegrityError, InsufficientDataError};
use stockcast_core::fingerprint::{hash_bytes, hash_file};
use stockcast_core::{
    Dataset, DatasetAssembler, FeatureEngine, GridStats, LabelGenerator, SessionGridBuilder,
    SymbolError, SymbolRows,
};

use crate::config::{normalize_version, PipelineConfig, SymbolSource};
use crate::export::{dataset_csv, write_atomic, write_json_atomic, write_parquet, FeatureView};
use crate::manifest::{DatasetManifest, SymbolFailure, SymbolManifest, SCHEMA_VERSION};

/// Errors that stop a whole version run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{version}: every symbol failed ({} failures)", .failures.len())]
    AllSymbolsFailed {
        version: String,
        failures: Vec<SymbolFailure>,
    },
    #[error("assembly failed: {0}")]
    Assembly(#[from] InsufficientDataError),
    #[error("failed to write artifacts: {0:#}")]
    Export(anyhow::Error),
}

/// One symbol's processed rows plus what the manifest records about it.
#[derive(Debug, Clone)]
pub struct SymbolOutcome {
    pub source: SymbolSource,
    pub source_hash: String,
    pub stats: GridStats,
    pub rows: SymbolRows,
}

/// Paths of the files written for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub csv: PathBuf,
    pub parquet: PathBuf,
    pub manifest: PathBuf,
    pub feature_view: PathBuf,
}

/// Summary of a version run.
#[derive(Debug, Clone)]
pub struct VersionReport {
    pub version: String,
    pub manifest: DatasetManifest,
    pub artifacts: ArtifactPaths,
}

impl VersionReport {
    pub fn failures(&self) -> &[SymbolFailure] {
        &self.manifest.failures
    }

    pub fn is_complete(&self) -> bool {
        self.manifest.failures.is_empty()
    }
}

/// Grid → features → labels for one symbol file.
#[derive(Debug, Clone)]
pub struct SymbolPipeline {
    ingestor: DataIngestor,
    grid: SessionGridBuilder,
    features: FeatureEngine,
    labels: LabelGenerator,
}

impl SymbolPipeline {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ingestor: DataIngestor::new(),
            grid: config.grid_builder()?,
            features: config.feature_engine()?,
            labels: config.label_generator()?,
        })
    }

    pub fn run(&self, source: &SymbolSource) -> Result<SymbolOutcome, SymbolError> {
        let symbol = source.symbol.as_str();
        let source_hash = hash_file(&source.path).map_err(|e| DataIntegrityError::Io {
            symbol: symbol.to_string(),
            path: source.path.clone(),
            source: e,
        })?;

        let ticks = self.ingestor.read_file(symbol, &source.path)?;
        let series = self.grid.build(symbol, ticks)?;
        let rows = SymbolRows::from_series(&series, &self.features, &self.labels).ensure_usable()?;

        info!(
            symbol = %symbol,
            raw_ticks = series.stats.raw_ticks,
            grid_rows = series.len(),
            feature_rows = rows.rows.len(),
            "processed symbol"
        );

        Ok(SymbolOutcome {
            source: source.clone(),
            source_hash,
            stats: series.stats,
            rows,
        })
    }
}

/// Runs one configured version end to end.
pub struct VersionPipeline<'a> {
    config: &'a PipelineConfig,
    symbol: SymbolPipeline,
    assembler: DatasetAssembler,
    schema: DatasetSchema,
    parallel: bool,
}

impl<'a> VersionPipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            symbol: SymbolPipeline::from_config(config)?,
            assembler: config.assembler()?,
            schema: config.schema(),
            parallel: true,
        })
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Process every symbol of `version`, write its artifacts, and report.
    ///
    /// Failed symbols are excluded and listed in the report. When every symbol
    /// fails nothing is written.
    pub fn run(&self, version: &str) -> Result<VersionReport, PipelineError> {
        let version = normalize_version(version);
        let sources = self.config.sources(&version)?;
        info!(version = %version, symbols = sources.len(), "preprocessing version");

        let results: Vec<Result<SymbolOutcome, SymbolError>> = if self.parallel {
            sources.par_iter().map(|s| self.symbol.run(s)).collect()
        } else {
            sources.iter().map(|s| self.symbol.run(s)).collect()
        };

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(symbol = %err.symbol(), kind = err.kind(), error = %err, "symbol failed");
                    failures.push(SymbolFailure::from(&err));
                }
            }
        }

        if outcomes.is_empty() {
            return Err(PipelineError::AllSymbolsFailed { version, failures });
        }

        let dataset = self
            .assembler
            .assemble(outcomes.iter().map(|o| o.rows.clone()).collect())?;
        let manifest_inputs = ManifestInputs {
            version: &version,
            outcomes: &outcomes,
            failures,
        };
        self.write(&dataset, manifest_inputs)
            .map_err(PipelineError::Export)
    }

    fn write(&self, dataset: &Dataset, inputs: ManifestInputs<'_>) -> anyhow::Result<VersionReport> {
        let version = inputs.version;
        let artifacts = ArtifactPaths {
            csv: self.config.processed_csv_path(version),
            parquet: self.config.processed_parquet_path(version),
            manifest: self.config.manifest_path(version),
            feature_view: self.config.feature_view_path(version),
        };

        let csv = dataset_csv(dataset, &self.schema)?;
        write_atomic(&artifacts.csv, &csv)?;
        write_parquet(dataset, &self.schema, &artifacts.parquet)?;

        let view = FeatureView::for_version(version, &self.schema, &artifacts.parquet);
        write_json_atomic(&artifacts.feature_view, &view)?;

        let manifest = self.manifest(dataset, hash_bytes(&csv), inputs)?;
        write_json_atomic(&artifacts.manifest, &manifest)?;

        info!(
            version = %version,
            train_rows = manifest.train_rows,
            test_rows = manifest.test_rows,
            failures = manifest.failures.len(),
            path = %artifacts.csv.display(),
            "wrote processed dataset"
        );

        Ok(VersionReport {
            version: version.to_string(),
            manifest,
            artifacts,
        })
    }

    fn manifest(
        &self,
        dataset: &Dataset,
        dataset_hash: String,
        inputs: ManifestInputs<'_>,
    ) -> anyhow::Result<DatasetManifest> {
        let symbols = inputs
            .outcomes
            .iter()
            .zip(&dataset.partitions)
            .map(|(o, part)| SymbolManifest {
                symbol: o.source.symbol.clone(),
                source: o.source.path.clone(),
                source_hash: o.source_hash.clone(),
                feature_rows: o.rows.rows.len(),
                train_rows: part.train,
                test_rows: part.test,
                grid: o.stats,
            })
            .collect();

        Ok(DatasetManifest {
            schema_version: SCHEMA_VERSION,
            version: inputs.version.to_string(),
            config_hash: self.config.dataset_config_hash(inputs.version)?,
            dataset_hash,
            columns: self.schema.column_names(),
            rolling_window_size: self.symbol.features.window(),
            label_horizon_minutes: self.symbol.labels.horizon_minutes(),
            train_fraction: self.assembler.train_fraction(),
            train_rows: dataset.train.len(),
            test_rows: dataset.test.len(),
            symbols,
            failures: inputs.failures,
        })
    }
}

struct ManifestInputs<'a> {
    version: &'a str,
    outcomes: &'a [SymbolOutcome],
    failures: Vec<SymbolFailure>,
}

/// Convenience wrapper: validate `config` and run `version` in parallel.
pub fn run_version(config: &PipelineConfig, version: &str) -> Result<VersionReport, PipelineError> {
    VersionPipeline::new(config)?.run(version)
}
