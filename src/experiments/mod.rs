//! Experiment runners that train estimators on `.ts` problems and write
//! tsml results files.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tsml_eval::cluster::TimeSeriesKMeans;
//! use tsml_eval::distances::Metric;
//! use tsml_eval::experiments::{
//!     load_and_run_clustering_experiment, ClusteringLoadOptions, NClusters,
//! };
//!
//! let mut kmeans = TimeSeriesKMeans::new(2).metric(Metric::Dtw).random_state(1);
//! let options = ClusteringLoadOptions {
//!     n_clusters: Some(NClusters::FromClasses),
//!     resample_id: 1,
//!     build_test_file: true,
//!     ..Default::default()
//! };
//! load_and_run_clustering_experiment(
//!     Path::new("data"),
//!     Path::new("results"),
//!     "Chinatown",
//!     &mut kmeans,
//!     &options,
//! )
//! .unwrap();
//! ```

mod clustering;
mod distance_clustering;
mod regression;
pub mod results;

pub use clustering::{
    load_and_run_clustering_experiment, run_clustering_experiment, ClusteringExperiment,
    ClusteringLoadOptions, NClusters,
};
pub use distance_clustering::{run_distance_clustering, ClustererKind, ClusteringExperimentConfig};
pub use regression::{
    load_and_run_regression_experiment, run_regression_experiment, RegressionExperiment,
    RegressionLoadOptions,
};
pub use results::{check_existing_results, results_present};
