//! Stockcast CLI: preprocess, train, status and history commands.
//!
//! Commands:
//! - `preprocess` runs a configured version through the preprocessing pipeline
//! - `train` fits the classifier on a processed version
//! - `status` reports which versions have artifacts and their row counts
//! - `history` prints the experiment history

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stockcast_runner::config::normalize_version;
use stockcast_runner::{
    run_version, train_version, DatasetManifest, ExperimentEntry, ExperimentHistory,
    PipelineConfig, TrainingReport, VersionReport,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "stockcast",
    about = "Stockcast: minute-bar preprocessing and direction classifier"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the processed dataset for one version.
    Preprocess {
        /// Path to the TOML pipeline config.
        #[arg(long, default_value = "stockcast.toml")]
        config: PathBuf,

        /// Version key, e.g. `v0` or `0`.
        #[arg(long)]
        version: String,
    },
    /// Train and evaluate the classifier on a processed version.
    Train {
        #[arg(long, default_value = "stockcast.toml")]
        config: PathBuf,

        #[arg(long)]
        version: String,
    },
    /// Show artifact status for every configured version.
    Status {
        #[arg(long, default_value = "stockcast.toml")]
        config: PathBuf,
    },
    /// Print recorded training runs.
    History {
        #[arg(long, default_value = "stockcast.toml")]
        config: PathBuf,

        /// Only show runs for this version.
        #[arg(long)]
        version: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Preprocess { config, version } => run_preprocess(&load_config(&config)?, &version),
        Commands::Train { config, version } => run_train(&load_config(&config)?, &version),
        Commands::Status { config } => run_status(&load_config(&config)?),
        Commands::History { config, version } => {
            run_history(&load_config(&config)?, version.as_deref())
        }
    }
}

/// Logs go to stderr so stdout stays a clean report. `RUST_LOG` overrides
/// the default `info` level.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing: {err}"))
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path).with_context(|| format!("invalid config {}", path.display()))
}

fn run_preprocess(config: &PipelineConfig, version: &str) -> Result<()> {
    let report = run_version(config, version)?;
    print_version_report(&report);

    let failures = report.failures();
    if !failures.is_empty() {
        for f in failures {
            eprintln!("{} failed ({}): {}", f.symbol, f.kind, f.message);
        }
        bail!(
            "{} of {} symbols failed for {}",
            failures.len(),
            failures.len() + report.manifest.symbols.len(),
            report.version
        );
    }
    Ok(())
}

fn print_version_report(report: &VersionReport) {
    let m = &report.manifest;
    println!("Version:      {}", report.version);
    println!("Dataset hash: {}", short_hash(&m.dataset_hash));
    println!("Rows:         {} train / {} test", m.train_rows, m.test_rows);
    println!();
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Symbol", "Raw", "Filled", "Rows", "Train", "Test"
    );
    println!("{}", "-".repeat(57));
    for s in &m.symbols {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
            s.symbol, s.grid.raw_ticks, s.grid.forward_filled, s.feature_rows, s.train_rows, s.test_rows
        );
    }
    println!();
    println!("CSV:      {}", report.artifacts.csv.display());
    println!("Parquet:  {}", report.artifacts.parquet.display());
    println!("Manifest: {}", report.artifacts.manifest.display());
}

fn run_train(config: &PipelineConfig, version: &str) -> Result<()> {
    let outcome = train_version(config, version)?;
    print_training_report(&outcome.report);
    println!();
    println!("Run id:  {}", short_hash(&outcome.entry.run_id));
    println!("Metrics: {}", outcome.metrics_path.display());
    println!("Model:   {}", outcome.model_path.display());
    Ok(())
}

fn print_training_report(report: &TrainingReport) {
    println!("Version:  {}", report.version);
    println!("Rows:     {} train / {} test", report.train_rows, report.test_rows);
    println!("Accuracy: {:.4}", report.accuracy);
    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>8}",
        "Class", "Precision", "Recall", "F1", "Support"
    );
    println!("{}", "-".repeat(50));
    for c in &report.classes {
        println!(
            "{:<8} {:>10.4} {:>10.4} {:>10.4} {:>8}",
            c.class, c.precision, c.recall, c.f1, c.support
        );
    }
    println!();
    println!("Feature importance (accuracy drop when shuffled):");
    for (name, drop) in &report.feature_importance {
        println!("  {name:<20} {drop:>8.4}");
    }
}

fn run_status(config: &PipelineConfig) -> Result<()> {
    println!("Output: {}", config.output.dir.display());
    println!();
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:<14} {:>9}",
        "Version", "Symbols", "Train", "Test", "Dataset", "Accuracy"
    );
    println!("{}", "-".repeat(61));

    for version in config.version_names() {
        let configured = config.sources(&version)?.len();
        let manifest_path = config.manifest_path(&version);
        if !manifest_path.exists() {
            println!("{version:<8} {configured:>8} {:>8} {:>8} {:<14} {:>9}", "-", "-", "(none)", "-");
            continue;
        }

        let m = DatasetManifest::load(&manifest_path)?;
        let accuracy = read_accuracy(&config.metrics_path(&version))
            .map_or_else(|| "-".to_string(), |a| format!("{a:.4}"));
        let dataset = if config.processed_csv_path(&version).exists() {
            short_hash(&m.dataset_hash).to_string()
        } else {
            "(csv missing)".to_string()
        };
        println!(
            "{version:<8} {:>8} {:>8} {:>8} {dataset:<14} {accuracy:>9}",
            format!("{}/{configured}", m.symbols.len()),
            m.train_rows,
            m.test_rows,
        );
    }
    Ok(())
}

fn read_accuracy(path: &Path) -> Option<f64> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<TrainingReport>(&text)
        .ok()
        .map(|r| r.accuracy)
}

fn run_history(config: &PipelineConfig, version: Option<&str>) -> Result<()> {
    let history = ExperimentHistory::new(config.output.history.clone());
    let entries = match version {
        Some(v) => history.for_version(&normalize_version(v)),
        None => history.read_all(),
    }
    .with_context(|| format!("failed to read {}", history.path().display()))?;

    if entries.is_empty() {
        println!("No runs recorded in {}", history.path().display());
        return Ok(());
    }

    println!(
        "{:<14} {:<20} {:<8} {:<14} {:>6} {:>6} {:>9}",
        "Run", "Timestamp", "Version", "Dataset", "Trees", "Depth", "Accuracy"
    );
    println!("{}", "-".repeat(83));
    for e in &entries {
        println!("{}", history_row(e));
    }
    Ok(())
}

fn history_row(e: &ExperimentEntry) -> String {
    format!(
        "{:<14} {:<20} {:<8} {:<14} {:>6} {:>6} {:>9.4}",
        short_hash(&e.run_id),
        e.timestamp.format("%Y-%m-%d %H:%M:%S"),
        e.version,
        short_hash(&e.dataset_hash),
        e.params.n_trees,
        e.params.max_depth,
        e.metrics.accuracy
    )
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
