use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::results::{
    check_existing_results, generated_comment, write_regression_results, RegressionSummary,
    ResultsHeader, Split,
};
use crate::dataset::{load_experiment_data, resample, LabelledCollection};
use crate::metrics::mean_squared_error;
use crate::preprocessing::normalise_series;
use crate::regression::{cross_val_predict, TimeSeriesRegressor};
use crate::{EvalError, Result};

#[derive(Clone, Debug)]
pub struct RegressionExperiment {
    pub regressor_name: Option<String>,
    pub dataset_name: String,
    pub resample_id: Option<u64>,
    pub build_test_file: bool,
    pub build_train_file: bool,
}

impl Default for RegressionExperiment {
    fn default() -> Self {
        Self {
            regressor_name: None,
            dataset_name: String::new(),
            resample_id: None,
            build_test_file: true,
            build_train_file: false,
        }
    }
}

/// Writes a TRAIN file of out-of-fold predictions (`min(10, n)` contiguous
/// folds) and a TEST file from a model fitted on the whole training split.
pub fn run_regression_experiment<R>(
    train: &LabelledCollection,
    test: &LabelledCollection,
    regressor: &mut R,
    results_path: &Path,
    experiment: &RegressionExperiment,
) -> Result<()>
where
    R: TimeSeriesRegressor + Clone,
{
    if !experiment.build_test_file && !experiment.build_train_file {
        return Err(EvalError::InvalidParameter(
            "Both test_file and train_file are set to False. At least one must be written."
                .to_string(),
        ));
    }

    let y_train = train.targets()?;
    let y_test = test.targets()?;
    let regressor_name = experiment
        .regressor_name
        .clone()
        .unwrap_or_else(|| regressor.name().to_string());
    let resample_id = experiment.resample_id.unwrap_or(0);

    let comment = generated_comment("run_regression_experiment");
    let parameter_info = regressor.parameter_info()?;
    let estimator_label = format!("{} ({})", regressor_name, regressor.name());
    let header = |split| ResultsHeader {
        dataset_name: experiment.dataset_name.clone(),
        estimator_label: estimator_label.clone(),
        split,
        resample_id,
        comment: comment.clone(),
        parameter_info: parameter_info.clone(),
    };

    if experiment.build_train_file {
        let cv_size = y_train.len().min(10);
        let start = Instant::now();
        let train_preds = cross_val_predict(regressor, &train.x, &y_train, cv_size)?;
        let train_time = start.elapsed().as_millis() as i64;

        let summary = RegressionSummary {
            mse: mean_squared_error(&y_train, &train_preds)?,
            fit_time: -1,
            predict_time: -1,
            benchmark_time: -1,
            memory_usage: -1,
            train_estimate_method: format!("{}F-CV", cv_size),
            train_estimate_time: train_time,
            fit_and_estimate_time: -1,
        };
        info!(mse = summary.mse, cv_size, "train estimate finished");
        write_regression_results(
            results_path,
            &regressor_name,
            &header(Split::Train),
            &summary,
            &y_train,
            &train_preds,
        )?;
    }

    if experiment.build_test_file {
        let start = Instant::now();
        regressor.fit(&train.x, &y_train)?;
        let fit_time = start.elapsed().as_millis() as i64;

        let start = Instant::now();
        let test_preds = regressor.predict(&test.x)?;
        let test_time = start.elapsed().as_millis() as i64;

        let summary = RegressionSummary {
            mse: mean_squared_error(&y_test, &test_preds)?,
            fit_time,
            predict_time: test_time,
            benchmark_time: -1,
            memory_usage: -1,
            train_estimate_method: "N/A".to_string(),
            train_estimate_time: -1,
            fit_and_estimate_time: -1,
        };
        info!(mse = summary.mse, fit_time, "test predictions scored");
        write_regression_results(
            results_path,
            &regressor_name,
            &header(Split::Test),
            &summary,
            &y_test,
            &test_preds,
        )?;
    }

    Ok(())
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionLoadOptions {
    pub regressor_name: Option<String>,
    pub resample_id: u64,
    pub build_train_file: bool,
    pub overwrite: bool,
    pub predefined_resample: bool,
    pub normalise: bool,
}

/// Loads `<problem_path>/<dataset>` and runs a regression experiment on it.
/// Resamples are unstratified since the targets are continuous.
pub fn load_and_run_regression_experiment<R>(
    problem_path: &Path,
    results_path: &Path,
    dataset: &str,
    regressor: &mut R,
    options: &RegressionLoadOptions,
) -> Result<bool>
where
    R: TimeSeriesRegressor + Clone,
{
    let regressor_name = options
        .regressor_name
        .clone()
        .unwrap_or_else(|| regressor.name().to_string());

    let (build_test_file, build_train_file) = check_existing_results(
        results_path,
        &regressor_name,
        dataset,
        options.resample_id,
        options.overwrite,
        true,
        options.build_train_file,
    );
    if !build_test_file && !build_train_file {
        warn!(
            dataset,
            regressor = %regressor_name,
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
        resample(&data.train, &data.test, options.resample_id)?
    } else {
        (data.train, data.test)
    };

    if options.normalise {
        train = LabelledCollection::new(normalise_series(&train.x)?, train.y)?;
        test = LabelledCollection::new(normalise_series(&test.x)?, test.y)?;
    }

    let experiment = RegressionExperiment {
        regressor_name: Some(regressor_name),
        dataset_name: dataset.to_string(),
        resample_id: Some(options.resample_id),
        build_test_file,
        build_train_file,
    };
    run_regression_experiment(&train, &test, regressor, results_path, &experiment)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TimeSeriesCollection;
    use crate::linear_model::Ridge;
    use crate::regression::TabularRegressorAdapter;
    use ndarray::array;
    use std::fs;
    use tempfile::tempdir;

    fn labelled(rows: ndarray::Array2<f64>, targets: &[f64]) -> LabelledCollection {
        LabelledCollection::new(
            TimeSeriesCollection::from_matrix(&rows).unwrap(),
            targets.iter().map(|t| t.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_regression_experiment_writes_files() {
        let dir = tempdir().unwrap();
        let train = labelled(
            array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0], [6.0, 1.0]],
            &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0],
        );
        let test = labelled(array![[7.0, 0.0], [8.0, 1.0]], &[14.0, 16.0]);
        let mut adapter = TabularRegressorAdapter::new(Ridge::new().alpha(1e-8));
        let experiment = RegressionExperiment {
            regressor_name: Some("ridge".to_string()),
            dataset_name: "Lines".to_string(),
            resample_id: Some(2),
            build_test_file: true,
            build_train_file: true,
        };

        run_regression_experiment(&train, &test, &mut adapter, dir.path(), &experiment).unwrap();

        let base = dir.path().join("ridge/Predictions/Lines");
        let train_file = fs::read_to_string(base.join("trainResample2.csv")).unwrap();
        let train_lines: Vec<&str> = train_file.lines().collect();
        let expected = "Lines,ridge (TabularRegressorAdapter),TRAIN,2,MILLISECONDS,";
        assert!(train_lines[0].starts_with(expected));
        assert!(train_lines[2].contains(",6F-CV,"));
        assert_eq!(train_lines.len(), 3 + 6);

        let test_file = fs::read_to_string(base.join("testResample2.csv")).unwrap();
        let test_lines: Vec<&str> = test_file.lines().collect();
        assert!(test_lines[2].contains(",N/A,-1,-1"));
        let mse: f64 = test_lines[2].split(',').next().unwrap().parse().unwrap();
        assert!(mse < 1e-4);
    }

    #[test]
    fn test_non_numeric_targets_error() {
        let dir = tempdir().unwrap();
        let train = LabelledCollection::new(
            TimeSeriesCollection::from_matrix(&array![[1.0], [2.0]]).unwrap(),
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();
        let mut adapter = TabularRegressorAdapter::new(Ridge::new());
        let experiment = RegressionExperiment::default();
        let test = train.clone();
        let result =
            run_regression_experiment(&train, &test, &mut adapter, dir.path(), &experiment);
        assert!(result.is_err());
    }
}
