//! Stockcast Runner: pipeline orchestration on top of `stockcast-core`.
//!
//! - TOML configuration with per-version symbol lists
//! - Per-version preprocessing with parallel per-symbol work and partial-failure reports
//! - Artifact export (CSV, Parquet, manifest, feature-view descriptor)
//! - Random forest training, classification metrics, experiment history

pub mod config;
pub mod export;
pub mod history;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod trainer;

pub use config::{PipelineConfig, SymbolSource, TrainerConfig};
pub use export::{read_dataset_csv, FeatureView};
pub use history::{ExperimentEntry, ExperimentHistory, RunMetrics};
pub use manifest::{DatasetManifest, SymbolFailure, SymbolManifest};
pub use metrics::{ClassReport, ClassificationMetrics, ConfusionMatrix};
pub use pipeline::{
    run_version, ArtifactPaths, PipelineError, SymbolOutcome, SymbolPipeline, VersionPipeline,
    VersionReport,
};
pub use trainer::{train_version, ModelTrainer, TrainError, TrainingOutcome, TrainingReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn symbol_pipeline_is_send_sync() {
        // Shared across the rayon pool during preprocessing.
        assert_send::<SymbolPipeline>();
        assert_sync::<SymbolPipeline>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<VersionReport>();
        assert_sync::<VersionReport>();
        assert_send::<TrainingReport>();
        assert_sync::<TrainingReport>();
    }

    #[test]
    fn history_entry_is_send_sync() {
        assert_send::<ExperimentEntry>();
        assert_sync::<ExperimentEntry>();
    }
}
