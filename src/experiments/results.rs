//! Reading and writing prediction files in the tsml results layout.
//!
//! ```text
//! <results>/<estimator>/Predictions/<dataset>/<split>Resample<id>.csv
//! ```
//!
//! Every file starts with three header lines: identification, parameters and
//! summary statistics. One line per case follows.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::{EvalError, Matrix, Result, Vector};

pub(crate) const TIME_UNIT: &str = "MILLISECONDS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn file_prefix(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Split::Train => "TRAIN",
            Split::Test => "TEST",
        })
    }
}

pub fn results_file_path(
    results_path: &Path,
    estimator_name: &str,
    dataset_name: &str,
    split: Split,
    resample_id: u64,
) -> PathBuf {
    results_path
        .join(estimator_name)
        .join("Predictions")
        .join(dataset_name)
        .join(format!("{}Resample{}.csv", split.file_prefix(), resample_id))
}

/// Turns off each requested file that already exists, unless overwriting.
/// Returns the updated `(build_test_file, build_train_file)`.
pub fn check_existing_results(
    results_path: &Path,
    estimator_name: &str,
    dataset_name: &str,
    resample_id: u64,
    overwrite: bool,
    build_test_file: bool,
    build_train_file: bool,
) -> (bool, bool) {
    if overwrite {
        return (build_test_file, build_train_file);
    }

    let exists = |split| {
        results_file_path(results_path, estimator_name, dataset_name, split, resample_id).exists()
    };
    let build_test_file = build_test_file && !exists(Split::Test);
    let build_train_file = build_train_file && !exists(Split::Train);
    debug!(build_test_file, build_train_file, "checked existing results");
    (build_test_file, build_train_file)
}

/// True when both the train and test file for `resample_id` exist under
/// `estimator_path`, a directory already specific to one estimator.
pub fn results_present(estimator_path: &Path, dataset_name: &str, resample_id: u64) -> bool {
    let predictions = estimator_path.join("Predictions").join(dataset_name);
    predictions.join(format!("testResample{}.csv", resample_id)).exists()
        && predictions.join(format!("trainResample{}.csv", resample_id)).exists()
}

/// `Generated by <generator> on <timestamp>`, the comment closing the first line.
pub fn generated_comment(generator: &str) -> String {
    format!("Generated by {} on {}", generator, Local::now().format("%m/%d/%Y, %H:%M:%S"))
}

/// Floats always carry a fractional part: `1.0`, `0.5`.
fn float_field(value: f64) -> String {
    format!("{:?}", value)
}

/// Fields shared by the first two header lines.
#[derive(Clone, Debug)]
pub struct ResultsHeader {
    pub dataset_name: String,
    /// Name written on the first line, e.g. `dtw (TimeSeriesKMeans)`.
    pub estimator_label: String,
    pub split: Split,
    pub resample_id: u64,
    pub comment: String,
    pub parameter_info: String,
}

impl ResultsHeader {
    fn lines(&self) -> String {
        format!(
            "{},{},{},{},{},{}\n{}\n",
            self.dataset_name,
            self.estimator_label,
            self.split,
            self.resample_id,
            TIME_UNIT,
            self.comment,
            self.parameter_info.replace(['\n', '\r'], " ")
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusteringSummary {
    pub clustering_accuracy: f64,
    pub fit_time: i64,
    pub predict_time: i64,
    pub benchmark_time: i64,
    pub memory_usage: i64,
    pub n_classes: usize,
    pub n_clusters: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegressionSummary {
    pub mse: f64,
    pub fit_time: i64,
    pub predict_time: i64,
    pub benchmark_time: i64,
    pub memory_usage: i64,
    pub train_estimate_method: String,
    pub train_estimate_time: i64,
    pub fit_and_estimate_time: i64,
}

fn write_file(
    path: &Path,
    contents: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| EvalError::io(dir, e))?;
    }
    let file = File::create(path).map_err(|e| EvalError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    contents(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| EvalError::io(path, e))?;
    info!(path = %path.display(), "results written");
    Ok(())
}

/// Writes a clustering results file: one `<true>,<pred>,,<p0>,<p1>,...` row per case.
pub fn write_clustering_results(
    results_path: &Path,
    estimator_name: &str,
    header: &ResultsHeader,
    summary: &ClusteringSummary,
    y_true: &[usize],
    y_pred: &[usize],
    probabilities: &Matrix,
) -> Result<PathBuf> {
    if y_true.len() != y_pred.len() || y_pred.len() != probabilities.nrows() {
        return Err(EvalError::InvalidInput(format!(
            "{} true labels, {} predictions and {} probability rows do not line up",
            y_true.len(),
            y_pred.len(),
            probabilities.nrows()
        )));
    }

    let path = results_file_path(
        results_path,
        estimator_name,
        &header.dataset_name,
        header.split,
        header.resample_id,
    );
    write_file(&path, |w| {
        w.write_all(header.lines().as_bytes())?;
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            float_field(summary.clustering_accuracy),
            summary.fit_time,
            summary.predict_time,
            summary.benchmark_time,
            summary.memory_usage,
            summary.n_classes,
            summary.n_clusters
        )?;
        for ((t, p), probs) in y_true.iter().zip(y_pred).zip(probabilities.rows()) {
            let probs: Vec<String> = probs.iter().map(|&v| float_field(v)).collect();
            writeln!(w, "{},{},,{}", t, p, probs.join(","))?;
        }
        Ok(())
    })?;
    Ok(path)
}

/// Writes a regression results file: one `<true>,<pred>` row per case.
pub fn write_regression_results(
    results_path: &Path,
    estimator_name: &str,
    header: &ResultsHeader,
    summary: &RegressionSummary,
    y_true: &Vector,
    y_pred: &Vector,
) -> Result<PathBuf> {
    if y_true.len() != y_pred.len() {
        return Err(EvalError::DimensionMismatch {
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }

    let path = results_file_path(
        results_path,
        estimator_name,
        &header.dataset_name,
        header.split,
        header.resample_id,
    );
    write_file(&path, |w| {
        w.write_all(header.lines().as_bytes())?;
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            float_field(summary.mse),
            summary.fit_time,
            summary.predict_time,
            summary.benchmark_time,
            summary.memory_usage,
            summary.train_estimate_method,
            summary.train_estimate_time,
            summary.fit_and_estimate_time
        )?;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            writeln!(w, "{},{}", float_field(*t), float_field(*p))?;
        }
        Ok(())
    })?;
    Ok(path)
}
