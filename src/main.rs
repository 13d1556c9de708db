//! tsml-eval CLI
//!
//! Runs a single clustering or regression experiment and writes its results
//! files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use tsml_eval::cluster::AveragingMethod;
use tsml_eval::experiments::{
    load_and_run_regression_experiment, run_distance_clustering, ClustererKind,
    ClusteringExperimentConfig, RegressionLoadOptions,
};
use tsml_eval::linear_model::{LinearRegression, Ridge};
use tsml_eval::regression::{TabularRegressor, TabularRegressorAdapter};

#[derive(Parser, Debug)]
#[command(name = "tsml-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Benchmark time series estimators and write tsml results files",
    long_about = None
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Distance based clustering of one dataset resample
    Cluster(ClusterArgs),
    /// Tabular regressor on flattened series
    Regress(RegressArgs),
}

/// Lenient boolean, anything other than "true" (any case) is false.
fn parse_flag(s: &str) -> Result<bool, String> {
    Ok(s.eq_ignore_ascii_case("true"))
}

#[derive(Args, Debug)]
struct ClusterArgs {
    /// Directory holding <dataset>/<dataset>_TRAIN.ts and _TEST.ts
    data_dir: PathBuf,

    /// Directory results are written under
    results_dir: PathBuf,

    /// kmeans or kmedoids
    clusterer: ClustererKind,

    /// Problem name
    dataset: String,

    /// Resample id, 0 keeps the split on disk
    resample: u64,

    /// dtw, dtw5, wdtw, msm, twe, erp, edr, lcss, euclidean or squared
    distance: String,

    /// Accepted for compatibility, train files are always written
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set, default_value = "false")]
    train_fold: bool,

    /// mean or ba
    #[arg(default_value = "mean")]
    averaging: AveragingMethod,

    /// Z-normalise every series
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set, default_value = "true")]
    normalise: bool,

    /// Tune the distance parameter on the training data
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set, default_value = "false")]
    tune: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RegressorKind {
    Linear,
    Ridge,
}

#[derive(Args, Debug)]
struct RegressArgs {
    /// Directory holding <dataset>/<dataset>_TRAIN.ts and _TEST.ts
    data_dir: PathBuf,

    /// Directory results are written under
    results_dir: PathBuf,

    /// Tabular regressor to wrap
    #[arg(value_enum)]
    regressor: RegressorKind,

    /// Problem name
    dataset: String,

    /// Resample id, 0 keeps the split on disk
    resample: u64,

    /// Ridge penalty
    #[arg(long, default_value = "1.0")]
    alpha: f64,

    /// Also write cross-validated train predictions
    #[arg(long)]
    train_file: bool,

    /// Z-normalise every series
    #[arg(long)]
    normalise: bool,

    /// Replace results files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Read <dataset><resample>_TRAIN.ts instead of resampling
    #[arg(long)]
    predefined_resample: bool,
}

fn regress_with<R: TabularRegressor>(regressor: R, name: &str, args: &RegressArgs) -> Result<bool> {
    let mut adapter = TabularRegressorAdapter::new(regressor)
        .pad_unequal(true)
        .concatenate_channels(true)
        .clone_estimator(false);
    let options = RegressionLoadOptions {
        regressor_name: Some(name.to_string()),
        resample_id: args.resample,
        build_train_file: args.train_file,
        overwrite: args.overwrite,
        predefined_resample: args.predefined_resample,
        normalise: args.normalise,
    };
    load_and_run_regression_experiment(
        &args.data_dir,
        &args.results_dir,
        &args.dataset,
        &mut adapter,
        &options,
    )
    .with_context(|| format!("Regression experiment on {} failed", args.dataset))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("tsml-eval v{}", env!("CARGO_PKG_VERSION"));

    let ran = match cli.command {
        Command::Cluster(args) => {
            let config = ClusteringExperimentConfig {
                data_dir: args.data_dir,
                results_dir: args.results_dir,
                clusterer: args.clusterer,
                dataset: args.dataset,
                resample: args.resample,
                distance: args.distance,
                train_fold: args.train_fold,
                averaging: args.averaging,
                normalise: args.normalise,
                tune: args.tune,
            };
            run_distance_clustering(&config)
                .with_context(|| format!("Clustering experiment on {} failed", config.dataset))?
        }
        Command::Regress(args) => match args.regressor {
            RegressorKind::Linear => {
                regress_with(LinearRegression::new(), "LinearRegression", &args)?
            }
            RegressorKind::Ridge => regress_with(Ridge::new().alpha(args.alpha), "Ridge", &args)?,
        },
    };

    if ran {
        info!("Experiment finished");
    } else {
        info!("Results already present, nothing to do");
    }
    Ok(())
}
