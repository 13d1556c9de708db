//! Distance based clustering benchmark: one k-means or k-medoids run per
//! dataset, resample and elastic distance, optionally with the distance's
//! main parameter tuned on the training split.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::clustering::{count_classes, run_clustering_experiment, ClusteringExperiment};
use super::results::{check_existing_results, results_present};
use crate::cluster::tuning::{tune_edr, tune_erp, tune_lcss, tune_msm, tune_twe, tune_window};
use crate::cluster::{
    AveragingMethod, InitAlgorithm, TimeSeriesClusterer, TimeSeriesKMeans, TimeSeriesKMedoids,
};
use crate::dataset::{load_experiment_data, stratified_resample, LabelledCollection};
use crate::distances::{DistanceParams, Metric};
use crate::preprocessing::normalise_series;
use crate::{EvalError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClustererKind {
    KMeans,
    KMedoids,
}

impl fmt::Display for ClustererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClustererKind::KMeans => "kmeans",
            ClustererKind::KMedoids => "kmedoids",
        })
    }
}

impl FromStr for ClustererKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kmeans" => Ok(ClustererKind::KMeans),
            "kmedoids" => Ok(ClustererKind::KMedoids),
            other => Err(EvalError::InvalidParameter(format!(
                "unknown clusterer '{}', expected 'kmeans' or 'kmedoids'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringExperimentConfig {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub clusterer: ClustererKind,
    pub dataset: String,
    pub resample: u64,
    /// Distance name, also the results directory. `dtw5` is DTW with a 5% window.
    pub distance: String,
    /// Kept for argument compatibility; train and test files are always written.
    pub train_fold: bool,
    pub averaging: AveragingMethod,
    pub normalise: bool,
    pub tune: bool,
}

impl Default for ClusteringExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            results_dir: PathBuf::from("results"),
            clusterer: ClustererKind::KMeans,
            dataset: String::new(),
            resample: 0,
            distance: "dtw".to_string(),
            train_fold: false,
            averaging: AveragingMethod::Mean,
            normalise: true,
            tune: false,
        }
    }
}

/// Parameters every run starts from before tuning or the fixed windows.
fn base_params() -> DistanceParams {
    DistanceParams::default()
        .window(1.0)
        .epsilon(0.05)
        .g(0.05)
        .c(1.0)
        .nu(0.05)
        .lmbda(1.0)
}

/// Resolves the configured distance name to a metric and its parameters.
fn resolve_distance(name: &str) -> Result<(Metric, DistanceParams)> {
    if name == "dtw5" {
        return Ok((Metric::Dtw, base_params().window(0.05)));
    }
    let metric: Metric = name.parse()?;
    let params = match metric {
        Metric::Dtw | Metric::Wdtw => base_params().window(0.2),
        _ => base_params(),
    };
    Ok((metric, params))
}

/// Picks the distance parameter by Davies-Bouldin grid search on `train`.
fn tuned_params(
    metric: Metric,
    params: DistanceParams,
    train: &LabelledCollection,
    n_clusters: usize,
    random_state: u64,
) -> Result<DistanceParams> {
    let x = &train.x;
    let seed = Some(random_state);
    let tuned = match metric {
        Metric::Dtw | Metric::Wdtw => {
            params.window(tune_window(metric, x, n_clusters, seed)?)
        }
        Metric::Msm => params.c(tune_msm(x, n_clusters, seed)?),
        Metric::Twe => {
            let (nu, lmbda) = tune_twe(x, n_clusters, seed)?;
            params.nu(nu).lmbda(lmbda)
        }
        Metric::Erp => params.g(tune_erp(x, n_clusters, seed)?),
        Metric::Edr => params.epsilon(tune_edr(x, n_clusters, seed)?),
        Metric::Lcss => params.epsilon(tune_lcss(x, n_clusters, seed)?),
        Metric::Euclidean | Metric::Squared => params,
    };
    info!(?tuned, "tuned distance parameters");
    Ok(tuned)
}

pub(crate) fn build_clusterer(
    config: &ClusteringExperimentConfig,
    metric: Metric,
    params: DistanceParams,
    n_clusters: usize,
) -> Box<dyn TimeSeriesClusterer> {
    let random_state = config.resample + 1;
    match config.clusterer {
        ClustererKind::KMeans => Box::new(
            TimeSeriesKMeans::new(n_clusters)
                .init_algorithm(InitAlgorithm::Random)
                .max_iter(30)
                .n_init(10)
                .averaging_method(config.averaging)
                .metric(metric)
                .distance_params(params)
                .random_state(random_state),
        ),
        ClustererKind::KMedoids => Box::new(
            TimeSeriesKMedoids::new(n_clusters)
                .init_algorithm(InitAlgorithm::Random)
                .max_iter(30)
                .n_init(10)
                .metric(metric)
                .distance_params(params)
                .random_state(random_state),
        ),
    }
}

/// Runs one configured experiment. Returns `false` when nothing was done:
/// both results files were present, or the test file was and existing
/// results are never overwritten.
pub fn run_distance_clustering(config: &ClusteringExperimentConfig) -> Result<bool> {
    let estimator_name = config.distance.as_str();
    let estimator_path = config.results_dir.join(estimator_name);
    if results_present(&estimator_path, &config.dataset, config.resample) {
        info!(
            dataset = %config.dataset,
            results = %config.results_dir.display(),
            "Ignoring dataset, results already present"
        );
        return Ok(false);
    }
    let (build_test_file, _) = check_existing_results(
        &config.results_dir,
        estimator_name,
        &config.dataset,
        config.resample,
        false,
        true,
        true,
    );
    if !build_test_file {
        info!(
            dataset = %config.dataset,
            resample = config.resample,
            "test results already present, skipping"
        );
        return Ok(false);
    }

    info!(
        dataset = %config.dataset,
        resample = config.resample,
        normalise = config.normalise,
        clusterer = %config.clusterer,
        distance = %config.distance,
        averaging = %config.averaging,
        tune = config.tune,
        train_fold = config.train_fold,
        "running distance clustering"
    );

    let (metric, params) = resolve_distance(&config.distance)?;

    let data =
        load_experiment_data(&config.data_dir, &config.dataset, config.resample, false)?;
    let (mut train, mut test) = if data.needs_resample {
        stratified_resample(&data.train, &data.test, config.resample)?
    } else {
        (data.train, data.test)
    };

    if config.normalise {
        train = LabelledCollection::new(normalise_series(&train.x)?, train.y)?;
        test = LabelledCollection::new(normalise_series(&test.x)?, test.y)?;
    }

    let n_clusters = count_classes(&train.y);
    let params = if config.tune {
        tuned_params(metric, params, &train, n_clusters, config.resample + 1)?
    } else {
        params
    };
    info!(?params, "distance parameters");

    let mut clusterer = build_clusterer(config, metric, params, n_clusters);
    let experiment = ClusteringExperiment {
        clusterer_name: Some(estimator_name.to_string()),
        dataset_name: config.dataset.clone(),
        resample_id: Some(config.resample),
        n_clusters: None,
        build_train_file: true,
        build_test_file: true,
    };
    run_clustering_experiment(
        &train,
        Some(&test),
        clusterer.as_mut(),
        &config.results_dir,
        &experiment,
    )?;
    info!("done");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tuning::parameter_grid;
    use crate::dataset::TimeSeriesCollection;
    use ndarray::array;

    fn separable() -> LabelledCollection {
        let x = TimeSeriesCollection::from_matrix(&array![
            [0.0, 0.2, 0.1, 0.0, 0.1],
            [0.1, 0.0, 0.2, 0.1, 0.0],
            [0.0, 0.1, 0.0, 0.2, 0.1],
            [5.0, 5.2, 5.1, 5.0, 5.1],
            [5.1, 5.0, 5.2, 5.1, 5.0],
            [5.0, 5.1, 5.0, 5.2, 5.1]
        ])
        .unwrap();
        let y = ["a", "a", "a", "b", "b", "b"].map(String::from).to_vec();
        LabelledCollection::new(x, y).unwrap()
    }

    #[test]
    fn test_tuned_params_set_each_metrics_parameter() {
        let train = separable();
        let base = base_params();
        let tune = |metric| tuned_params(metric, base, &train, 2, 1).unwrap();

        for metric in [Metric::Dtw, Metric::Wdtw] {
            let tuned = tune(metric);
            assert!(parameter_grid(0.01, 20).contains(&tuned.window));
            assert_eq!(tuned.g, base.g);
        }

        let msm = tune(Metric::Msm);
        assert!(parameter_grid(0.25, 20).contains(&msm.c));
        assert_eq!(msm.window, base.window);
        assert_eq!(msm.epsilon, base.epsilon);

        let twe = tune(Metric::Twe);
        assert!(parameter_grid(0.25, 4).contains(&twe.nu));
        assert!(parameter_grid(0.2, 5).contains(&twe.lmbda));
        assert_eq!(twe.c, base.c);

        let erp = tune(Metric::Erp);
        assert!(parameter_grid(0.2, 10).contains(&erp.g));
        assert_eq!(erp.c, base.c);

        for metric in [Metric::Edr, Metric::Lcss] {
            let tuned = tune(metric);
            let epsilon = tuned.epsilon.unwrap();
            assert!(parameter_grid(0.01, 20).contains(&epsilon));
            assert_eq!(tuned.window, base.window);
        }

        assert_eq!(tune(Metric::Euclidean), base);
    }

    #[test]
    fn test_resolve_distance_windows() {
        let (metric, params) = resolve_distance("dtw5").unwrap();
        assert_eq!(metric, Metric::Dtw);
        assert_eq!(params.window, 0.05);

        let (metric, params) = resolve_distance("wdtw").unwrap();
        assert_eq!(metric, Metric::Wdtw);
        assert_eq!(params.window, 0.2);

        let (metric, params) = resolve_distance("msm").unwrap();
        assert_eq!(metric, Metric::Msm);
        assert_eq!(params.window, 1.0);
        assert_eq!(params.epsilon, Some(0.05));
        assert_eq!(params.nu, 0.05);

        assert!(resolve_distance("cosine").is_err());
    }

    #[test]
    fn test_clusterer_kind_parsing() {
        assert_eq!(
            "kmedoids".parse::<ClustererKind>().unwrap(),
            ClustererKind::KMedoids
        );
        assert_eq!(ClustererKind::KMeans.to_string(), "kmeans");
        assert!("dbscan".parse::<ClustererKind>().is_err());
    }

    #[test]
    fn test_build_clusterer_parameters() {
        let config = ClusteringExperimentConfig {
            resample: 4,
            ..Default::default()
        };
        let clusterer = build_clusterer(&config, Metric::Dtw, base_params().window(0.2), 3);
        assert_eq!(clusterer.name(), "TimeSeriesKMeans");
        assert_eq!(clusterer.n_clusters(), 3);

        let info: serde_json::Value =
            serde_json::from_str(&clusterer.parameter_info().unwrap()).unwrap();
        assert_eq!(info["random_state"], 5);
        assert_eq!(info["max_iter"], 30);
        assert_eq!(info["init_algorithm"], "random");
        assert_eq!(info["distance_params"]["window"], 0.2);
    }

    #[test]
    fn test_config_deserialises_with_defaults() {
        let json = r#"{"dataset": "Chinatown", "distance": "msm", "clusterer": "kmedoids"}"#;
        let config: ClusteringExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.clusterer, ClustererKind::KMedoids);
        assert!(config.normalise);
        assert!(!config.tune);
        assert_eq!(config.averaging, AveragingMethod::Mean);
    }
}
