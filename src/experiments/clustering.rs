use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::results::{
    check_existing_results, generated_comment, write_clustering_results, ClusteringSummary,
    ResultsHeader, Split,
};
use crate::cluster::TimeSeriesClusterer;
use crate::dataset::{load_experiment_data, stratified_resample, LabelledCollection};
use crate::metrics::clustering_accuracy_score;
use crate::preprocessing::{normalise_series, LabelEncoder};
use crate::{EvalError, Matrix, Result};

/// How the runner sets the clusterer's cluster count before fitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NClusters {
    /// One cluster per class in the training labels.
    FromClasses,
    Fixed(usize),
}

impl NClusters {
    /// `-1` selects the number of classes, any positive value is fixed.
    pub fn from_arg(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(NClusters::FromClasses),
            v if v > 0 => Ok(NClusters::Fixed(v as usize)),
            v => Err(EvalError::InvalidParameter(format!(
                "n_clusters must be -1 or positive, got {}",
                v
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClusteringExperiment {
    /// Directory name under the results path, defaults to the clusterer's name.
    pub clusterer_name: Option<String>,
    pub dataset_name: String,
    pub resample_id: Option<u64>,
    /// `None` keeps the clusterer's own cluster count.
    pub n_clusters: Option<NClusters>,
    pub build_train_file: bool,
    pub build_test_file: bool,
}

impl Default for ClusteringExperiment {
    fn default() -> Self {
        Self {
            clusterer_name: None,
            dataset_name: "N/A".to_string(),
            resample_id: None,
            n_clusters: None,
            build_train_file: true,
            build_test_file: false,
        }
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}

fn argmax_rows(probabilities: &Matrix) -> Vec<usize> {
    probabilities
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (k, &p)| {
                    if p > best.1 { (k, p) } else { best }
                })
                .0
        })
        .collect()
}

/// Fits `clusterer` on the training split and writes the requested train
/// and test prediction files under `results_path`.
///
/// Class labels are encoded with a `LabelEncoder` fitted on the training
/// labels; a test label unseen in training is an error.
pub fn run_clustering_experiment(
    train: &LabelledCollection,
    test: Option<&LabelledCollection>,
    clusterer: &mut dyn TimeSeriesClusterer,
    results_path: &Path,
    experiment: &ClusteringExperiment,
) -> Result<()> {
    if !experiment.build_test_file && !experiment.build_train_file {
        return Err(EvalError::InvalidParameter(
            "Both test_file and train_file are set to False. At least one must be written."
                .to_string(),
        ));
    }
    if experiment.n_clusters == Some(NClusters::Fixed(0)) {
        return Err(EvalError::InvalidParameter(
            "n_clusters must be -1 or positive, got 0".to_string(),
        ));
    }
    let test = match (experiment.build_test_file, test) {
        (true, None) => {
            return Err(EvalError::InvalidInput(
                "Test data and labels not provided, cannot build test file.".to_string(),
            ));
        }
        (true, Some(test)) => Some(test),
        (false, _) => None,
    };

    let clusterer_name = experiment
        .clusterer_name
        .clone()
        .unwrap_or_else(|| clusterer.name().to_string());
    let resample_id = experiment.resample_id.unwrap_or(0);

    let mut encoder = LabelEncoder::new();
    let y_train = encoder.fit_transform(&train.y)?;
    let y_test = test.map(|t| encoder.transform(&t.y)).transpose()?;
    let n_classes = encoder.classes().map_or(0, |c| c.len());

    let comment = format!(
        "{}. Encoder dictionary: {}",
        generated_comment("run_clustering_experiment"),
        encoder.encoding_description()
    );

    match experiment.n_clusters {
        Some(NClusters::FromClasses) => clusterer.set_n_clusters(n_classes),
        Some(NClusters::Fixed(k)) => clusterer.set_n_clusters(k),
        None => {}
    }

    info!(
        clusterer = %clusterer_name,
        dataset = %experiment.dataset_name,
        resample_id,
        n_clusters = clusterer.n_clusters(),
        "fitting clusterer"
    );
    let start = Instant::now();
    clusterer.fit(&train.x)?;
    let fit_time = elapsed_ms(start);

    let parameter_info = clusterer.parameter_info()?;
    let estimator_label = format!("{} ({})", clusterer_name, clusterer.name());
    let header = |split| ResultsHeader {
        dataset_name: experiment.dataset_name.clone(),
        estimator_label: estimator_label.clone(),
        split,
        resample_id,
        comment: comment.clone(),
        parameter_info: parameter_info.clone(),
    };

    let start = Instant::now();
    let train_probs = clusterer.predict_proba(&train.x)?;
    let train_preds = argmax_rows(&train_probs);
    let train_time = elapsed_ms(start);

    if experiment.build_train_file {
        let summary = ClusteringSummary {
            clustering_accuracy: clustering_accuracy_score(&y_train, &train_preds)?,
            fit_time,
            predict_time: train_time,
            benchmark_time: -1,
            memory_usage: -1,
            n_classes,
            n_clusters: train_probs.ncols(),
        };
        info!(accuracy = summary.clustering_accuracy, "train predictions scored");
        write_clustering_results(
            results_path,
            &clusterer_name,
            &header(Split::Train),
            &summary,
            &y_train,
            &train_preds,
            &train_probs,
        )?;
    }

    if let (Some(test), Some(y_test)) = (test, y_test) {
        let start = Instant::now();
        let test_probs = clusterer.predict_proba(&test.x)?;
        let test_preds = argmax_rows(&test_probs);
        let test_time = elapsed_ms(start);

        let summary = ClusteringSummary {
            clustering_accuracy: clustering_accuracy_score(&y_test, &test_preds)?,
            fit_time,
            predict_time: test_time,
            benchmark_time: -1,
            memory_usage: -1,
            n_classes,
            n_clusters: test_probs.ncols(),
        };
        info!(accuracy = summary.clustering_accuracy, "test predictions scored");
        write_clustering_results(
            results_path,
            &clusterer_name,
            &header(Split::Test),
            &summary,
            &y_test,
            &test_preds,
            &test_probs,
        )?;
    }

    Ok(())
}

/// Options for `load_and_run_clustering_experiment`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringLoadOptions {
    pub clusterer_name: Option<String>,
    pub n_clusters: Option<NClusters>,
    /// Zero keeps the split on disk, any other value draws a stratified resample.
    pub resample_id: u64,
    pub build_test_file: bool,
    pub overwrite: bool,
    /// Read `<dataset><resample_id>_TRAIN.ts` instead of resampling.
    pub predefined_resample: bool,
    /// Cluster train and test together; no test file is written.
    pub combine_train_test_split: bool,
    /// Z-normalise every series before clustering.
    pub normalise: bool,
}

/// Loads `<problem_path>/<dataset>` and runs a clustering experiment on it.
///
/// Returns `false` without touching the data when every requested file
/// already exists and `overwrite` is off.
pub fn load_and_run_clustering_experiment(
    problem_path: &Path,
    results_path: &Path,
    dataset: &str,
    clusterer: &mut dyn TimeSeriesClusterer,
    options: &ClusteringLoadOptions,
) -> Result<bool> {
    let clusterer_name = options
        .clusterer_name
        .clone()
        .unwrap_or_else(|| clusterer.name().to_string());
    let build_test_file = options.build_test_file && !options.combine_train_test_split;

    let (build_test_file, build_train_file) = check_existing_results(
        results_path,
        &clusterer_name,
        dataset,
        options.resample_id,
        options.overwrite,
        build_test_file,
        true,
    );
    if !build_test_file && !build_train_file {
        warn!(
            dataset,
            clusterer = %clusterer_name,
            "All files exist and not overwriting, skipping."
        );
        return Ok(false);
    }

    let data = load_experiment_data(
        problem_path,
        dataset,
        options.resample_id,
        options.predefined_resample,
    )?;
    let (mut train, mut test) = if data.needs_resample {
        stratified_resample(&data.train, &data.test, options.resample_id)?
    } else {
        (data.train, data.test)
    };

    if options.normalise {
        train = LabelledCollection::new(normalise_series(&train.x)?, train.y)?;
        test = LabelledCollection::new(normalise_series(&test.x)?, test.y)?;
    }

    if options.combine_train_test_split {
        let x = train.x.concat(&test.x)?;
        let y = train.y.iter().chain(test.y.iter()).cloned().collect();
        train = LabelledCollection::new(x, y)?;
    }

    let experiment = ClusteringExperiment {
        clusterer_name: Some(clusterer_name),
        dataset_name: dataset.to_string(),
        resample_id: Some(options.resample_id),
        n_clusters: options.n_clusters,
        build_train_file,
        build_test_file,
    };
    let test = if build_test_file { Some(&test) } else { None };
    run_clustering_experiment(&train, test, clusterer, results_path, &experiment)?;
    Ok(true)
}

/// Number of distinct classes in a label set.
pub(crate) fn count_classes(labels: &[String]) -> usize {
    let mut distinct: Vec<&String> = labels.iter().collect();
    distinct.sort();
    distinct.dedup();
    distinct.len()
}
