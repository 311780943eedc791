//! Pipeline configuration loaded from TOML.
//!
//! Every recognized option lives here. Only the documented defaults exist
//! (session 09:15–15:30 Mon–Fri, window 10, horizon 5, train fraction 0.8);
//! version symbol lists have none and must be supplied.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use stockcast_core::calendar::parse_session_time;
use stockcast_core::data::{symbol_from_path, DatasetSchema, DuplicatePolicy};
use stockcast_core::error::ConfigError;
use stockcast_core::fingerprint::hash_json;
use stockcast_core::{DatasetAssembler, FeatureEngine, LabelGenerator, SessionCalendar, SessionGridBuilder};

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Source files per pipeline version, keyed `v0`, `v1`, ...
    #[serde(default)]
    pub versions: BTreeMap<String, Vec<PathBuf>>,
    #[serde(default)]
    pub trainer: TrainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub start: String,
    pub end: String,
    pub weekdays: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start: "09:15".into(),
            end: "15:30".into(),
            weekdays: ["Mon", "Tue", "Wed", "Thu", "Fri"].map(String::from).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    pub rolling_window_size: usize,
    pub label_horizon_minutes: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window_size: 10,
            label_horizon_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub train_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { train_fraction: 0.8 }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Longest forward-fill run in minutes; unbounded when absent.
    #[serde(default)]
    pub max_fill_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub history: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/processed"),
            history: PathBuf::from("experiments.jsonl"),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    pub n_trees: u16,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// One input file and the symbol derived from its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSource {
    pub symbol: String,
    pub path: PathBuf,
}

impl PipelineConfig {
    /// Load, normalise, and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse, normalise, and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut versions = BTreeMap::new();
        for (key, paths) in std::mem::take(&mut config.versions) {
            let normalized = normalize_version(&key);
            if versions.insert(normalized.clone(), paths).is_some() {
                return Err(ConfigError::invalid(
                    "versions",
                    format!("version '{normalized}' is declared twice"),
                ));
            }
        }
        config.versions = versions;

        config.validate()?;
        Ok(config)
    }

    /// Check every recognized option. Runs before any symbol is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calendar()?;
        self.grid_builder()?;
        self.feature_engine()?;
        self.label_generator()?;
        self.assembler()?;
        self.validate_trainer()?;

        if self.versions.is_empty() {
            return Err(ConfigError::Missing("versions".into()));
        }
        for version in self.versions.keys() {
            self.sources(version)?;
        }
        Ok(())
    }

    fn validate_trainer(&self) -> Result<(), ConfigError> {
        let t = &self.trainer;
        if t.n_trees == 0 {
            return Err(ConfigError::invalid("trainer.n_trees", "must be at least 1"));
        }
        if t.max_depth == 0 {
            return Err(ConfigError::invalid("trainer.max_depth", "must be at least 1"));
        }
        if t.min_samples_split < 2 {
            return Err(ConfigError::invalid("trainer.min_samples_split", "must be at least 2"));
        }
        if t.min_samples_leaf == 0 {
            return Err(ConfigError::invalid("trainer.min_samples_leaf", "must be at least 1"));
        }
        Ok(())
    }

    pub fn calendar(&self) -> Result<SessionCalendar, ConfigError> {
        let start = parse_session_time("session_start_time", &self.session.start)?;
        let end = parse_session_time("session_end_time", &self.session.end)?;
        let weekdays = self
            .session
            .weekdays
            .iter()
            .map(|d| {
                d.parse::<Weekday>()
                    .map_err(|_| ConfigError::invalid("valid_weekdays", format!("unknown weekday '{d}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        SessionCalendar::new(start, end, &weekdays)
    }

    pub fn grid_builder(&self) -> Result<SessionGridBuilder, ConfigError> {
        SessionGridBuilder::new(self.calendar()?)
            .with_duplicate_policy(self.grid.duplicate_policy)
            .with_fill_cap(self.grid.max_fill_minutes)
    }

    pub fn feature_engine(&self) -> Result<FeatureEngine, ConfigError> {
        FeatureEngine::new(self.features.rolling_window_size)
    }

    pub fn label_generator(&self) -> Result<LabelGenerator, ConfigError> {
        LabelGenerator::new(self.features.label_horizon_minutes)
    }

    pub fn assembler(&self) -> Result<DatasetAssembler, ConfigError> {
        DatasetAssembler::new(self.split.train_fraction)
    }

    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::new(self.features.rolling_window_size)
    }

    /// Version keys, in sorted order.
    pub fn version_names(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }

    /// Symbols and files for `version`, in configured order.
    ///
    /// Accepts `0` as well as `v0`.
    pub fn sources(&self, version: &str) -> Result<Vec<SymbolSource>, ConfigError> {
        let key = normalize_version(version);
        let paths = self
            .versions
            .get(&key)
            .ok_or_else(|| ConfigError::UnknownVersion(version.to_string()))?;
        if paths.is_empty() {
            return Err(ConfigError::invalid(
                "symbol_list_per_version",
                format!("version '{key}' lists no source files"),
            ));
        }

        let mut seen = HashSet::new();
        paths
            .iter()
            .map(|path| {
                let symbol = symbol_from_path(path).ok_or_else(|| {
                    ConfigError::invalid(
                        "symbol_list_per_version",
                        format!("cannot derive a symbol from '{}'", path.display()),
                    )
                })?;
                if !seen.insert(symbol.clone()) {
                    return Err(ConfigError::invalid(
                        "symbol_list_per_version",
                        format!("symbol '{symbol}' appears twice in version '{key}'"),
                    ));
                }
                Ok(SymbolSource {
                    symbol,
                    path: path.clone(),
                })
            })
            .collect()
    }

    /// Hash of everything that shapes the processed dataset for `version`.
    ///
    /// Trainer settings and output paths are excluded, so retraining or moving
    /// the output directory keeps the hash.
    pub fn dataset_config_hash(&self, version: &str) -> Result<String, serde_json::Error> {
        let key = normalize_version(version);
        hash_json(&DatasetIdentity {
            session: &self.session,
            features: &self.features,
            split: &self.split,
            grid: &self.grid,
            version: &key,
            sources: self.versions.get(&key).map(Vec::as_slice).unwrap_or_default(),
        })
    }

    pub fn processed_csv_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "processed", "csv")
    }

    pub fn processed_parquet_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "processed", "parquet")
    }

    pub fn manifest_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "processed", "manifest.json")
    }

    pub fn feature_view_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "feature_view", "json")
    }

    pub fn metrics_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "metrics", "json")
    }

    pub fn model_path(&self, version: &str) -> PathBuf {
        self.artifact_path(version, "model", "json")
    }

    fn artifact_path(&self, version: &str, stem: &str, ext: &str) -> PathBuf {
        let key = normalize_version(version);
        self.output.dir.join(format!("{stem}_{key}.{ext}"))
    }
}

#[derive(Serialize)]
struct DatasetIdentity<'a> {
    session: &'a SessionConfig,
    features: &'a FeatureConfig,
    split: &'a SplitConfig,
    grid: &'a GridConfig,
    version: &'a str,
    sources: &'a [PathBuf],
}

/// `0` → `v0`, `V1` → `v1`, `v2` unchanged.
pub fn normalize_version(version: &str) -> String {
    let v = version.trim();
    let digits = v.strip_prefix(['v', 'V']).unwrap_or(v);
    format!("v{digits}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [versions]
        v0 = ["data/v0/AARTIIND__EQ__NSE__NSE__MINUTE.csv", "data/v0/ABCAPITAL__EQ__NSE__NSE__MINUTE.csv"]
    "#;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.features.rolling_window_size, 10);
        assert_eq!(config.features.label_horizon_minutes, 5);
        assert_eq!(config.split.train_fraction, 0.8);
        assert_eq!(config.grid.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert_eq!(config.grid.max_fill_minutes, None);
        assert_eq!(config.trainer, TrainerConfig::default());
        assert_eq!(config.calendar().unwrap(), SessionCalendar::default());
    }

    #[test]
    fn sources_derive_symbols_in_order() {
        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        let sources = config.sources("0").unwrap();
        let symbols: Vec<_> = sources.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AARTIIND", "ABCAPITAL"]);
        assert_eq!(config.sources("v0").unwrap(), sources);
    }

    #[test]
    fn full_config_parses() {
        let config = PipelineConfig::from_toml(
            r#"
            [session]
            start = "10:00"
            end = "14:00:00"
            weekdays = ["Mon", "Wednesday"]

            [features]
            rolling_window_size = 15
            label_horizon_minutes = 3

            [split]
            train_fraction = 0.75

            [grid]
            duplicate_policy = "reject"
            max_fill_minutes = 30

            [output]
            dir = "out"
            history = "out/history.jsonl"

            [versions]
            1 = ["a/X.csv"]

            [trainer]
            n_trees = 10
            max_depth = 4
            min_samples_split = 4
            min_samples_leaf = 2
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.calendar().unwrap().weekdays(), vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(config.grid.max_fill_minutes, Some(30));
        assert_eq!(config.version_names(), vec!["v1"]);
        assert_eq!(config.processed_csv_path("1"), PathBuf::from("out/processed_v1.csv"));
        assert_eq!(config.schema().rolling_avg_column(), "rolling_avg_15");
    }

    #[test]
    fn rejects_invalid_options() {
        let cases = [
            ("[session]\nstart = \"15:30\"\nend = \"09:15\"\nweekdays = [\"Mon\"]", "session"),
            ("[session]\nstart = \"09:15\"\nend = \"15:30\"\nweekdays = []", "valid_weekdays"),
            ("[session]\nstart = \"09:15\"\nend = \"15:30\"\nweekdays = [\"Funday\"]", "valid_weekdays"),
            ("[features]\nrolling_window_size = 0\nlabel_horizon_minutes = 5", "rolling_window_size"),
            ("[features]\nrolling_window_size = 10\nlabel_horizon_minutes = 0", "label_horizon_minutes"),
            ("[split]\ntrain_fraction = 1.0", "train_fraction"),
            ("[grid]\nmax_fill_minutes = 0", "max_fill_minutes"),
        ];
        for (section, option) in cases {
            let toml = format!("{section}\n{MINIMAL}");
            match PipelineConfig::from_toml(&toml) {
                Err(ConfigError::Invalid { option: got, .. }) => assert_eq!(got, option, "{toml}"),
                other => panic!("expected invalid {option}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_bad_versions() {
        assert!(matches!(
            PipelineConfig::from_toml("[split]\ntrain_fraction = 0.8"),
            Err(ConfigError::Missing(_))
        ));
        assert!(PipelineConfig::from_toml("[versions]\nv0 = []").is_err());
        assert!(PipelineConfig::from_toml("[versions]\nv0 = [\"a/X.csv\", \"b/X__EQ.csv\"]").is_err());
        assert!(PipelineConfig::from_toml("[versions]\n0 = [\"a/X.csv\"]\nv0 = [\"a/Y.csv\"]").is_err());

        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert!(matches!(config.sources("v9"), Err(ConfigError::UnknownVersion(_))));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = PipelineConfig::from_toml(&format!("[features]\nwindow = 3\n{MINIMAL}")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn dataset_hash_ignores_trainer_settings() {
        let a = PipelineConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        b.trainer.n_trees = 99;
        assert_eq!(
            a.dataset_config_hash("v0").unwrap(),
            b.dataset_config_hash("v0").unwrap()
        );
        b.features.rolling_window_size = 20;
        assert_ne!(
            a.dataset_config_hash("v0").unwrap(),
            b.dataset_config_hash("v0").unwrap()
        );
    }

    #[test]
    fn normalizes_version_names() {
        assert_eq!(normalize_version("0"), "v0");
        assert_eq!(normalize_version("V1"), "v1");
        assert_eq!(normalize_version(" v2 "), "v2");
    }
}
